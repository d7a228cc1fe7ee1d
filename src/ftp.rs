use std::net::ToSocketAddrs;

use suppaftp::{FtpStream, Mode};
use tracing::{debug, warn};

use crate::config::{MetaboLightsSettings, NetworkSettings};
use crate::error::MetaboError;

pub trait FtpSession {
    fn cwd(&mut self, path: &str) -> Result<(), MetaboError>;
    fn nlst(&mut self) -> Result<Vec<String>, MetaboError>;
    fn quit(self: Box<Self>) -> Result<(), MetaboError>;
}

pub trait FtpConnector: Send + Sync {
    fn connect(&self, settings: &MetaboLightsSettings) -> Result<Box<dyn FtpSession>, MetaboError>;
}

#[derive(Debug, Clone)]
pub struct SuppaFtpConnector {
    network: NetworkSettings,
}

impl SuppaFtpConnector {
    pub fn new(network: NetworkSettings) -> Self {
        Self { network }
    }
}

impl FtpConnector for SuppaFtpConnector {
    fn connect(&self, settings: &MetaboLightsSettings) -> Result<Box<dyn FtpSession>, MetaboError> {
        let host = format!("{}:{}", settings.ftp_host, settings.ftp_port);
        let addr = host
            .to_socket_addrs()
            .map_err(|err| MetaboError::Ftp(format!("resolve {host}: {err}")))?
            .next()
            .ok_or_else(|| MetaboError::Ftp(format!("no address for {host}")))?;

        debug!(%host, "connecting");
        let mut stream = FtpStream::connect_timeout(addr, self.network.connect_timeout())
            .map_err(|err| MetaboError::Ftp(format!("connect {host}: {err}")))?;
        let socket = stream.get_ref();
        socket
            .set_read_timeout(Some(self.network.read_timeout()))
            .and_then(|_| socket.set_write_timeout(Some(self.network.read_timeout())))
            .map_err(|err| MetaboError::Ftp(err.to_string()))?;
        stream.set_mode(Mode::Passive);
        stream
            .login(&settings.ftp_user, &settings.ftp_password)
            .map_err(|err| MetaboError::Ftp(format!("login {host}: {err}")))?;
        debug!(%host, user = %settings.ftp_user, "connected");
        Ok(Box::new(SuppaFtpSession { stream }))
    }
}

struct SuppaFtpSession {
    stream: FtpStream,
}

impl FtpSession for SuppaFtpSession {
    fn cwd(&mut self, path: &str) -> Result<(), MetaboError> {
        debug!(path, "CWD");
        self.stream
            .cwd(path)
            .map_err(|err| MetaboError::Ftp(format!("cwd {path}: {err}")))
    }

    fn nlst(&mut self) -> Result<Vec<String>, MetaboError> {
        let names = self
            .stream
            .nlst(None)
            .map_err(|err| MetaboError::Ftp(format!("nlst: {err}")))?;
        debug!(entries = names.len(), "NLST");
        Ok(names)
    }

    fn quit(mut self: Box<Self>) -> Result<(), MetaboError> {
        if let Err(err) = self.stream.quit() {
            warn!(error = %err, "failed to quit FTP session gracefully");
        }
        Ok(())
    }
}
