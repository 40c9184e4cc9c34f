use bitcoincore_rpc::jsonrpc::{self, simple_http};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("rpc `{method}` failed: {cause}")]
pub struct RpcError {
    pub method: &'static str,
    pub cause: RpcCause,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcCause {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("timed out waiting for the node")]
    Timeout,
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("node returned error {code}: {message}")]
    Rejected { code: i32, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RpcCause {
    /// True when the node definitely did not act on the request.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            RpcCause::Rejected { .. } | RpcCause::Auth(_) | RpcCause::InvalidParameter(_)
        )
    }
}

impl RpcError {
    pub fn new(method: &'static str, cause: RpcCause) -> Self {
        Self { method, cause }
    }

    pub fn from_rpc(method: &'static str, err: bitcoincore_rpc::Error) -> Self {
        Self::new(method, classify(err))
    }
}

fn classify(err: bitcoincore_rpc::Error) -> RpcCause {
    use bitcoincore_rpc::Error;

    match err {
        Error::JsonRpc(jsonrpc::Error::Rpc(e)) => RpcCause::Rejected {
            code: e.code,
            message: e.message,
        },
        Error::JsonRpc(jsonrpc::Error::Transport(e)) => {
            let message = e.to_string();
            match e.downcast_ref::<simple_http::Error>() {
                Some(simple_http::Error::SocketError(io_err))
                    if matches!(
                        io_err.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    RpcCause::Timeout
                }
                Some(simple_http::Error::HttpErrorCode(401 | 403)) => RpcCause::Auth(message),
                _ => RpcCause::Connection(message),
            }
        }
        Error::ReturnedError(message) => RpcCause::Rejected { code: 0, message },
        Error::InvalidCookieFile => RpcCause::Auth("invalid cookie file".to_string()),
        Error::Io(e) => RpcCause::Connection(e.to_string()),
        other => RpcCause::Malformed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(err: simple_http::Error) -> bitcoincore_rpc::Error {
        bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Transport(Box::new(err)))
    }

    #[test]
    fn node_error_is_rejected() {
        let err = bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(jsonrpc::error::RpcError {
            code: -13,
            message: "Please enter the wallet passphrase with walletpassphrase first.".to_string(),
            data: None,
        }));

        let err = RpcError::from_rpc("signrawtransactionwithwallet", err);
        assert_eq!(err.method, "signrawtransactionwithwallet");
        assert!(matches!(err.cause, RpcCause::Rejected { code: -13, .. }));
        assert!(err.cause.is_definitive());
    }

    #[test]
    fn socket_timeout_is_timeout() {
        let err = transport(simple_http::Error::SocketError(io::Error::from(
            io::ErrorKind::TimedOut,
        )));

        let err = RpcError::from_rpc("sendrawtransaction", err);
        assert_eq!(err.cause, RpcCause::Timeout);
        assert!(!err.cause.is_definitive());
    }

    #[test]
    fn refused_connection_is_not_definitive() {
        let err = transport(simple_http::Error::SocketError(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        )));

        let cause = RpcError::from_rpc("listunspent", err).cause;
        assert!(matches!(cause, RpcCause::Connection(_)));
        assert!(!cause.is_definitive());
    }

    #[test]
    fn unauthorized_is_auth() {
        let err = transport(simple_http::Error::HttpErrorCode(401));
        let cause = RpcError::from_rpc("listunspent", err).cause;
        assert!(matches!(cause, RpcCause::Auth(_)));
    }

    #[test]
    fn display_names_method() {
        let err = RpcError::new("createrawtransaction", RpcCause::Timeout);
        assert_eq!(
            err.to_string(),
            "rpc `createrawtransaction` failed: timed out waiting for the node"
        );
    }
}
