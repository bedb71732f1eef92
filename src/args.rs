use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

const MIN_SECRET_LEN: usize = 16;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Whether clients connect over https.
    /// If so, the session cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address to listen on. By default only the IPv4
    /// loopback is used.
    #[arg(short, long, env = "IP")]
    address: Option<String>,

    /// The port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Where users, tasks and categories are stored.
    #[arg(short, long, env = "DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Secret the session cookie is signed with. Changing it logs everyone out.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    secret: String,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn secret(&self) -> Result<&str, String> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes"
            ));
        }
        Ok(&self.secret)
    }
}
