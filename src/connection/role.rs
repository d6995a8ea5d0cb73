//! Endpoint role (client or server).

/// Endpoint role.
///
/// Determines which negotiated parameters apply to the local compressor and
/// which to the local decompressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Client role - compresses with the `client_*` parameters.
    Client,
    /// Server role - compresses with the `server_*` parameters.
    Server,
}

impl Role {
    /// Check if this is the server role.
    #[inline]
    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// The role of the other endpoint.
    ///
    /// Inbound messages were compressed by the peer, so the decompressor
    /// uses the peer's parameters.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "Client"),
            Role::Server => write!(f, "Server"),
        }
    }
}
