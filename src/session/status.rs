use crate::voice::RegistrationState;

/// UI-visible connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Registering,
    Registered,
    Unregistered,
    Error,
    InCall,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Registering => "registering",
            ConnectionStatus::Registered => "registered",
            ConnectionStatus::Unregistered => "unregistered",
            ConnectionStatus::Error => "error",
            ConnectionStatus::InCall => "in-call",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "Not connected",
            ConnectionStatus::Registering => "Registering...",
            ConnectionStatus::Registered => "Registered",
            ConnectionStatus::Unregistered => "Disconnected",
            ConnectionStatus::Error => "Error",
            ConnectionStatus::InCall => "In call",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle | ConnectionStatus::Unregistered => "#94a3b8",
            ConnectionStatus::Registering => "#facc15",
            ConnectionStatus::Registered => "#22c55e",
            ConnectionStatus::InCall => "#f97316",
            ConnectionStatus::Error => "#ef4444",
        }
    }

    /// Whether the device is usable (the identity form offers Disconnect).
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionStatus::Registered | ConnectionStatus::InCall)
    }
}

impl From<RegistrationState> for ConnectionStatus {
    fn from(state: RegistrationState) -> Self {
        match state {
            RegistrationState::Registered => ConnectionStatus::Registered,
            RegistrationState::Registering => ConnectionStatus::Registering,
            RegistrationState::Unregistered => ConnectionStatus::Unregistered,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain-data view of the session, pushed to the UI after every change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    pub identity: Option<String>,
    pub has_active_call: bool,
    pub has_incoming_call: bool,
    pub incoming_caller: Option<String>,
    pub muted: bool,
    pub busy: bool,
    pub error: Option<String>,
}
