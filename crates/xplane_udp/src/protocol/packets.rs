//! # Packet Definitions
//!
//! Every datagram of the X-Plane UDP protocol used by the client.
//!
//! ```text
//! Beacon     "BECN\0" | main u8 | minor u8 | software i32 | xp i32 | role u32 | port u16 | hostname
//! Subscribe  "RREF\0" | freq i32 | id i32 | name[400]
//! Update     "RREF\0" | (id i32, value f32)*
//! Set        "DREF\0" | value f32 | name[500]
//! Info req   "RPOS\0" | ascii freq | NUL
//! Info       "RPOS\0" | PlaneInfo (64 bytes)
//! ```

use bytemuck::{Pod, Zeroable};

use super::codec::{PacketReader, PacketWriter};
use crate::error::{XPlaneError, XPlaneResult};

/// Length of every command header: four letters and a terminator byte.
pub const HEADER_LEN: usize = 5;

/// Command tags of the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Dataref subscription (client -> sim) and dataref updates (sim -> client).
    Rref,
    /// Dataref write.
    Dref,
    /// Basic info request (client -> sim) and basic info (sim -> client).
    Rpos,
    /// Multicast beacon.
    Becn,
}

impl Command {
    /// Header bytes as sent by the client.
    #[must_use]
    pub const fn header(self) -> &'static [u8; HEADER_LEN] {
        match self {
            Self::Rref => b"RREF\0",
            Self::Dref => b"DREF\0",
            Self::Rpos => b"RPOS\0",
            Self::Becn => b"BECN\0",
        }
    }

    /// Classifies a datagram by its four-letter tag.
    ///
    /// Only the letters are compared: the simulator terminates some replies
    /// with `,` instead of a NUL. Datagrams shorter than a header are `None`.
    #[must_use]
    pub fn classify(datagram: &[u8]) -> Option<Self> {
        if datagram.len() < HEADER_LEN {
            return None;
        }
        match &datagram[..4] {
            b"RREF" => Some(Self::Rref),
            b"DREF" => Some(Self::Dref),
            b"RPOS" => Some(Self::Rpos),
            b"BECN" => Some(Self::Becn),
            _ => None,
        }
    }
}

/// Position, attitude and velocity of the user aircraft.
///
/// Size: 64 bytes, laid out exactly as the `RPOS` reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PlaneInfo {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Altitude above mean sea level in meters.
    pub altitude: f64,
    /// Height above ground in meters.
    pub height_agl: f32,
    /// Pitch in degrees.
    pub pitch: f32,
    /// True heading in degrees.
    pub heading: f32,
    /// Roll in degrees.
    pub roll: f32,
    /// East velocity in m/s (OpenGL x).
    pub velocity_x: f32,
    /// Up velocity in m/s (OpenGL y).
    pub velocity_y: f32,
    /// South velocity in m/s (OpenGL z).
    pub velocity_z: f32,
    /// Roll rate in rad/s.
    pub roll_rate: f32,
    /// Pitch rate in rad/s.
    pub pitch_rate: f32,
    /// Yaw rate in rad/s.
    pub yaw_rate: f32,
}

impl PlaneInfo {
    /// Size in bytes.
    pub const SIZE: usize = 64;

    /// Decodes the payload of an `RPOS` reply (header already stripped).
    pub fn decode(payload: &[u8]) -> XPlaneResult<Self> {
        PacketReader::new(payload).get()
    }
}

const _: () = assert!(std::mem::size_of::<PlaneInfo>() == PlaneInfo::SIZE);

/// Decoded simulator announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeaconInfo {
    /// Major beacon version.
    pub main_version: u8,
    /// Minor beacon version.
    pub minor_version: u8,
    /// Application id (1 = X-Plane).
    pub software: i32,
    /// X-Plane version, e.g. 120_100.
    pub xplane_version: i32,
    /// Role of the host (master, external visual, IOS).
    pub role: u32,
    /// Port the simulator listens on for commands.
    pub port: u16,
    /// Host name of the simulator machine.
    pub hostname: String,
}

impl BeaconInfo {
    /// Header plus fixed fields.
    pub const MIN_SIZE: usize = HEADER_LEN + 16;

    /// Returns true if `datagram` carries the beacon tag and the fixed fields.
    #[must_use]
    pub fn is_beacon(datagram: &[u8]) -> bool {
        datagram.len() >= Self::MIN_SIZE && datagram.starts_with(Command::Becn.header())
    }

    /// Decodes a full beacon datagram, header included.
    pub fn decode(datagram: &[u8]) -> XPlaneResult<Self> {
        let mut reader = PacketReader::at(datagram, HEADER_LEN);
        let main_version = reader.get::<u8>()?;
        let minor_version = reader.get::<u8>()?;
        let software = reader.get::<i32>()?;
        let xplane_version = reader.get::<i32>()?;
        let role = reader.get::<u32>()?;
        let port = reader.get::<u16>()?;
        let hostname = reader.rest();
        let end = hostname.iter().position(|&b| b == 0).unwrap_or(hostname.len());

        Ok(Self {
            main_version,
            minor_version,
            software,
            xplane_version,
            role,
            port,
            hostname: String::from_utf8_lossy(&hostname[..end]).into_owned(),
        })
    }

    /// Beacon 1.0 through 1.2 from X-Plane itself.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.main_version == 1 && self.minor_version <= 2 && self.software == 1
    }

    /// Fails with `VersionNotSupported` unless the beacon is supported.
    pub fn check_version(&self) -> XPlaneResult<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(XPlaneError::VersionNotSupported {
                main: self.main_version,
                minor: self.minor_version,
                software: self.software,
            })
        }
    }
}

/// Builds a subscribe (or stop, with `freq == 0`) packet.
pub fn subscribe_packet(freq: i32, id: i32, name: &str, name_width: usize) -> XPlaneResult<Vec<u8>> {
    let mut buffer = vec![0u8; HEADER_LEN + 8 + name_width];
    PacketWriter::new(&mut buffer)
        .put(Command::Rref.header())?
        .put(&freq)?
        .put(&id)?
        .put_fixed(name.as_bytes(), name_width)?;
    Ok(buffer)
}

/// Builds a set packet writing `value` into `name`.
pub fn set_packet(value: f32, name: &str, name_width: usize) -> XPlaneResult<Vec<u8>> {
    let mut buffer = vec![0u8; HEADER_LEN + 4 + name_width];
    PacketWriter::new(&mut buffer)
        .put(Command::Dref.header())?
        .put(&value)?
        .put_fixed(name.as_bytes(), name_width)?;
    Ok(buffer)
}

/// Builds a basic info request; `freq == 0` stops the stream.
pub fn basic_info_packet(freq: i32) -> XPlaneResult<Vec<u8>> {
    let digits = freq.to_string();
    let mut buffer = vec![0u8; HEADER_LEN + digits.len() + 1];
    PacketWriter::new(&mut buffer)
        .put(Command::Rpos.header())?
        .put(digits.as_str())?
        .put(&0u8)?;
    Ok(buffer)
}

/// Decodes the `(id, value)` records of an update payload (header already stripped).
///
/// A trailing partial record fails the whole payload.
pub fn decode_updates(payload: &[u8]) -> XPlaneResult<Vec<(i32, f32)>> {
    let mut reader = PacketReader::new(payload);
    let mut updates = Vec::with_capacity(payload.len() / 8);
    while reader.remaining() > 0 {
        let id = reader.get::<i32>()?;
        let value = reader.get::<f32>()?;
        updates.push((id, value));
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(main: u8, minor: u8, software: i32, port: u16, host: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; BeaconInfo::MIN_SIZE + host.len()];
        PacketWriter::new(&mut buf)
            .put(b"BECN\0")
            .unwrap()
            .put(&main)
            .unwrap()
            .put(&minor)
            .unwrap()
            .put(&software)
            .unwrap()
            .put(&120_100i32)
            .unwrap()
            .put(&1u32)
            .unwrap()
            .put(&port)
            .unwrap()
            .put(host)
            .unwrap();
        buf
    }

    #[test]
    fn test_classify() {
        assert_eq!(Command::classify(b"RREF,\x01\0\0\0"), Some(Command::Rref));
        assert_eq!(Command::classify(b"RPOS\0"), Some(Command::Rpos));
        assert_eq!(Command::classify(b"RREF"), None);
        assert_eq!(Command::classify(b"XXXX\0abc"), None);
    }

    #[test]
    fn test_subscribe_packet_layout() {
        let packet = subscribe_packet(5, 42, "sim/test", 400).unwrap();
        assert_eq!(packet.len(), 413);
        assert_eq!(&packet[..5], b"RREF\0");
        assert_eq!(i32::from_ne_bytes(packet[5..9].try_into().unwrap()), 5);
        assert_eq!(i32::from_ne_bytes(packet[9..13].try_into().unwrap()), 42);
        assert_eq!(&packet[13..22], b"sim/test\0");
        assert!(packet[22..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_set_packet_layout() {
        let packet = set_packet(12_640.0, "sim/cockpit/radios/com1_freq_hz", 500).unwrap();
        assert_eq!(packet.len(), 509);
        assert_eq!(&packet[..5], b"DREF\0");
        assert_eq!(f32::from_ne_bytes(packet[5..9].try_into().unwrap()), 12_640.0);
        assert_eq!(packet[9 + 31], 0);
    }

    #[test]
    fn test_long_name_keeps_terminator() {
        let name = "x".repeat(450);
        let packet = subscribe_packet(1, 0, &name, 400).unwrap();
        assert_eq!(packet.len(), 413);
        assert_eq!(packet[412], 0);
        assert_eq!(packet[411], b'x');
    }

    #[test]
    fn test_basic_info_packet() {
        assert_eq!(basic_info_packet(2).unwrap(), b"RPOS\x002\0");
        assert_eq!(basic_info_packet(0).unwrap(), b"RPOS\x000\0");
        assert_eq!(basic_info_packet(20).unwrap(), b"RPOS\x0020\0");
    }

    #[test]
    fn test_decode_updates() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&3i32.to_ne_bytes());
        payload.extend_from_slice(&1.5f32.to_ne_bytes());
        payload.extend_from_slice(&9i32.to_ne_bytes());
        payload.extend_from_slice(&(-2.0f32).to_ne_bytes());
        assert_eq!(decode_updates(&payload).unwrap(), vec![(3, 1.5), (9, -2.0)]);

        payload.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(decode_updates(&payload), Err(XPlaneError::BufferBounds { .. })));
        assert!(decode_updates(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_plane_info_decode() {
        let info = PlaneInfo { longitude: 8.5, latitude: 47.4, heading: 270.0, yaw_rate: 0.1, ..Default::default() };
        let mut payload = bytemuck::bytes_of(&info).to_vec();
        assert_eq!(PlaneInfo::decode(&payload).unwrap(), info);

        payload.truncate(PlaneInfo::SIZE - 1);
        assert!(PlaneInfo::decode(&payload).is_err());
    }

    #[test]
    fn test_beacon_decode() {
        let datagram = beacon(1, 2, 1, 49000, b"sim-host\0");
        assert!(BeaconInfo::is_beacon(&datagram));
        let info = BeaconInfo::decode(&datagram).unwrap();
        assert_eq!(info.port, 49000);
        assert_eq!(info.xplane_version, 120_100);
        assert_eq!(info.hostname, "sim-host");
        assert!(info.check_version().is_ok());
    }

    #[test]
    fn test_beacon_version_rejected() {
        for (main, minor, software) in [(2, 0, 1), (1, 3, 1), (1, 1, 2)] {
            let info = BeaconInfo::decode(&beacon(main, minor, software, 49000, b"h")).unwrap();
            assert!(matches!(
                info.check_version(),
                Err(XPlaneError::VersionNotSupported { .. })
            ));
        }
    }

    #[test]
    fn test_not_a_beacon() {
        assert!(!BeaconInfo::is_beacon(b"BECN\0short"));
        let mut datagram = beacon(1, 1, 1, 49000, b"");
        datagram[0] = b'X';
        assert!(!BeaconInfo::is_beacon(&datagram));
    }
}
