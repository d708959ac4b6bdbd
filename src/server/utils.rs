//! HTTP server utility methods

use crate::server::server::HttpServer;
use crate::utils::error::GatewayError;

impl HttpServer {
    /// Turn a bind failure into an actionable message
    pub(crate) fn format_bind_error(
        error: std::io::Error,
        bind_addr: &str,
        port: u16,
    ) -> GatewayError {
        let error_str = error.to_string();

        if error.kind() == std::io::ErrorKind::AddrInUse
            || error_str.contains("os error 48")
            || error_str.contains("os error 98")
        {
            GatewayError::server(format!(
                "Port {} is already in use; stop the other process or pick another port \
                 (--port {} or VENOM_PORT={})",
                port,
                port.saturating_add(1),
                port.saturating_add(1)
            ))
        } else if error.kind() == std::io::ErrorKind::PermissionDenied
            || error_str.contains("os error 13")
        {
            GatewayError::server(format!(
                "Permission denied for port {}; use a port >= 1024 (--port 8000 or VENOM_PORT=8000)",
                port
            ))
        } else {
            GatewayError::server(format!("Failed to bind to {}: {}", bind_addr, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_format_bind_error_address_in_use() {
        let error = Error::new(ErrorKind::AddrInUse, "Address already in use");
        let result = HttpServer::format_bind_error(error, "0.0.0.0:8000", 8000);

        let error_msg = result.to_string();
        assert!(error_msg.contains("8000"));
        assert!(error_msg.contains("already in use"));
        assert!(error_msg.contains("VENOM_PORT=8001"));
    }

    #[test]
    fn test_format_bind_error_os_error_98() {
        let error = Error::other("os error 98");
        let result = HttpServer::format_bind_error(error, "127.0.0.1:9000", 9000);
        assert!(result.to_string().contains("already in use"));
    }

    #[test]
    fn test_format_bind_error_permission_denied() {
        let error = Error::new(ErrorKind::PermissionDenied, "Permission denied");
        let result = HttpServer::format_bind_error(error, "0.0.0.0:80", 80);

        let error_msg = result.to_string();
        assert!(error_msg.contains("Permission denied for port 80"));
        assert!(error_msg.contains("1024"));
    }

    #[test]
    fn test_format_bind_error_generic() {
        let error = Error::other("Network unreachable");
        let result = HttpServer::format_bind_error(error, "192.168.1.1:8080", 8080);

        let error_msg = result.to_string();
        assert!(error_msg.contains("Failed to bind"));
        assert!(error_msg.contains("192.168.1.1:8080"));
        assert!(error_msg.contains("Network unreachable"));
    }
}
