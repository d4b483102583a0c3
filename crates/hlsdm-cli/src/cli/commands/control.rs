//! `hlsdm pause|resume|cancel <queue-id>` – signal a running `hlsdm batch`.

use anyhow::{bail, Result};
use hlsdm_core::control::{default_control_socket_path, ControlCommand};

use crate::cli::control_socket;

pub async fn run_control(cmd: ControlCommand) -> Result<()> {
    let path = default_control_socket_path()?;
    let reply = control_socket::send_command(&path, cmd).await?;
    match reply.strip_prefix("error: ") {
        Some(reason) => bail!("{}: {}", cmd, reason),
        None => {
            println!("{}: {}", cmd, reply);
            Ok(())
        }
    }
}
