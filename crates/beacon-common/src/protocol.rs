use std::collections::HashMap;

use hyper::header::LOCATION;
use hyper::StatusCode;
use serde_json::Value;

use crate::registry::{InstanceInfo, InstanceStatus};

/// Whether an operation mutates server state. The retry layer treats the two
/// differently when classifying response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

/// The uniform set of operations a discovery client can perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Register(InstanceInfo),
    Cancel { app: String, instance_id: String },
    Heartbeat { app: String, instance_id: String },
    StatusUpdate { app: String, instance_id: String, status: InstanceStatus },
    GetApplications { regions: Vec<String> },
    GetDelta { regions: Vec<String> },
    GetVip { vip: String },
    GetSecureVip { vip: String },
    GetInstance { app: String, instance_id: String },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Register(_)
            | Request::Cancel { .. }
            | Request::Heartbeat { .. }
            | Request::StatusUpdate { .. } => RequestKind::Write,
            Request::GetApplications { .. }
            | Request::GetDelta { .. }
            | Request::GetVip { .. }
            | Request::GetSecureVip { .. }
            | Request::GetInstance { .. } => RequestKind::Read,
        }
    }

    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Register(_) => "register",
            Request::Cancel { .. } => "cancel",
            Request::Heartbeat { .. } => "heartbeat",
            Request::StatusUpdate { .. } => "statusUpdate",
            Request::GetApplications { .. } => "getApplications",
            Request::GetDelta { .. } => "getDelta",
            Request::GetVip { .. } => "getVip",
            Request::GetSecureVip { .. } => "getSecureVip",
            Request::GetInstance { .. } => "getInstance",
        }
    }
}

/// Response envelope returned by every transport client.
///
/// `location` is populated iff the status is one of the redirect family
/// carrying a `Location` header (301, 302, 307, 308).
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub entity: Option<Value>,
    pub location: Option<String>,
}

impl Response {
    pub fn with_status(status: u16) -> Self {
        Self { status, ..Default::default() }
    }

    pub fn ok(entity: Value) -> Self {
        Self { status: 200, entity: Some(entity), ..Default::default() }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        let location = location.into();
        let mut headers = HashMap::new();
        headers.insert(LOCATION.as_str().to_string(), location.clone());
        Self { status, headers, entity: None, location: Some(location) }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_success(&self) -> bool {
        self.status_code().is_success()
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 307 | 308)
    }
}
