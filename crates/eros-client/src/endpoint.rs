use std::str::FromStr;

use eros_transport::{
    LoopbackTransport, PubSubTransport, SerialTransport, TcpTransport, UdpTransport,
};

use crate::client::Eros;
use crate::config::ErosConfig;
use crate::error::{ErosError, Result};

/// Where a client connects, parsed from strings such as:
///
/// - `serial:/dev/ttyUSB0@115200` (baud defaults to 115200)
/// - `tcp:192.168.4.1:2000`
/// - `udp:[::1]:2000`
/// - `pubsub:127.0.0.1:2000`
/// - `loopback`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Serial { path: String, baud: u32 },
    Tcp { host: String, port: u16 },
    Udp { host: String, port: u16 },
    PubSub { host: String, port: u16 },
    /// In-memory echo, for trying things out without hardware.
    Loopback,
}

impl Endpoint {
    /// Start a client on this endpoint.
    pub fn open(&self, config: ErosConfig) -> Result<Eros> {
        match self {
            Endpoint::Serial { path, baud } => {
                Eros::new(SerialTransport::new(path.clone(), *baud), config)
            }
            Endpoint::Tcp { host, port } => Eros::new(TcpTransport::new(host.clone(), *port), config),
            Endpoint::Udp { host, port } => Eros::new(UdpTransport::new(host.clone(), *port), config),
            Endpoint::PubSub { host, port } => {
                Eros::new(PubSubTransport::new(host.clone(), *port), config)
            }
            Endpoint::Loopback => Eros::new(LoopbackTransport::echo(), config),
        }
    }

    /// Short transport name.
    pub fn kind(&self) -> &'static str {
        match self {
            Endpoint::Serial { .. } => "serial",
            Endpoint::Tcp { .. } => "tcp",
            Endpoint::Udp { .. } => "udp",
            Endpoint::PubSub { .. } => "pubsub",
            Endpoint::Loopback => "loopback",
        }
    }
}

impl FromStr for Endpoint {
    type Err = ErosError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason: &str| ErosError::InvalidEndpoint {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input == "loopback" {
            return Ok(Endpoint::Loopback);
        }
        let (scheme, rest) = input
            .split_once(':')
            .ok_or_else(|| invalid("expected <kind>:<address>"))?;

        match scheme {
            "serial" => {
                let (path, baud) = match rest.rsplit_once('@') {
                    Some((path, baud)) => (
                        path,
                        baud.parse::<u32>()
                            .map_err(|_| invalid("baud rate must be a positive integer"))?,
                    ),
                    None => (rest, SerialTransport::DEFAULT_BAUD_RATE),
                };
                if path.is_empty() {
                    return Err(invalid("missing device path"));
                }
                if baud == 0 {
                    return Err(invalid("baud rate must be a positive integer"));
                }
                Ok(Endpoint::Serial {
                    path: path.to_string(),
                    baud,
                })
            }
            "tcp" | "udp" | "pubsub" => {
                let (host, port) = split_host_port(rest).ok_or_else(|| invalid("expected <host>:<port>"))?;
                Ok(match scheme {
                    "tcp" => Endpoint::Tcp { host, port },
                    "udp" => Endpoint::Udp { host, port },
                    _ => Endpoint::PubSub { host, port },
                })
            }
            _ => Err(invalid("unknown kind (expected serial, tcp, udp, pubsub or loopback)")),
        }
    }
}

fn split_host_port(address: &str) -> Option<(String, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    let port = port.parse::<u16>().ok()?;
    Some((host.to_string(), port))
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn host_port(host: &str, port: u16) -> String {
            if host.contains(':') {
                format!("[{host}]:{port}")
            } else {
                format!("{host}:{port}")
            }
        }
        match self {
            Endpoint::Serial { path, baud } => write!(f, "serial:{path}@{baud}"),
            Endpoint::Tcp { host, port } => write!(f, "tcp:{}", host_port(host, *port)),
            Endpoint::Udp { host, port } => write!(f, "udp:{}", host_port(host, *port)),
            Endpoint::PubSub { host, port } => write!(f, "pubsub:{}", host_port(host, *port)),
            Endpoint::Loopback => f.write_str("loopback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_kind() {
        assert_eq!(
            "serial:/dev/ttyUSB0".parse::<Endpoint>().unwrap(),
            Endpoint::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: 115_200
            }
        );
        assert_eq!(
            "serial:COM3@2000000".parse::<Endpoint>().unwrap(),
            Endpoint::Serial {
                path: "COM3".to_string(),
                baud: 2_000_000
            }
        );
        assert_eq!(
            "tcp:192.168.4.1:2000".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp {
                host: "192.168.4.1".to_string(),
                port: 2000
            }
        );
        assert_eq!(
            "udp:[::1]:9000".parse::<Endpoint>().unwrap(),
            Endpoint::Udp {
                host: "::1".to_string(),
                port: 9000
            }
        );
        assert_eq!(
            "pubsub:localhost:2000".parse::<Endpoint>().unwrap(),
            Endpoint::PubSub {
                host: "localhost".to_string(),
                port: 2000
            }
        );
        assert_eq!("loopback".parse::<Endpoint>().unwrap(), Endpoint::Loopback);
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "",
            "tcp",
            "tcp:host",
            "tcp::2000",
            "tcp:host:99999",
            "serial:",
            "serial:/dev/ttyUSB0@fast",
            "serial:/dev/ttyUSB0@0",
            "bluetooth:aa:bb",
        ] {
            assert!(
                matches!(input.parse::<Endpoint>(), Err(ErosError::InvalidEndpoint { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn display_parses_back() {
        for input in ["serial:/dev/ttyACM0@500000", "tcp:[::1]:2000", "udp:10.0.0.2:4000", "loopback"] {
            let endpoint: Endpoint = input.parse().unwrap();
            assert_eq!(endpoint.to_string(), input);
        }
    }
}
