//! Wire messages of the synchronizer's `installapp` and `readynotify` services

/// `installapp.InstallAppRequest`
#[derive(Clone, PartialEq, prost::Message)]
pub struct InstallAppRequest {
    /// AppContext id
    #[prost(string, tag = "1")]
    pub app_context: String,
}

/// `installapp.InstallAppResponse`
#[derive(Clone, PartialEq, prost::Message)]
pub struct InstallAppResponse {
    /// Whether the synchronizer accepted the context
    #[prost(bool, tag = "1")]
    pub app_context_installed: bool,
    /// Reason when not accepted
    #[prost(string, tag = "2")]
    pub app_context_install_message: String,
}

/// `installapp.UninstallAppRequest`
#[derive(Clone, PartialEq, prost::Message)]
pub struct UninstallAppRequest {
    /// AppContext id
    #[prost(string, tag = "1")]
    pub app_context: String,
}

/// `installapp.UninstallAppResponse`
#[derive(Clone, PartialEq, prost::Message)]
pub struct UninstallAppResponse {
    /// Whether the synchronizer accepted the request
    #[prost(bool, tag = "1")]
    pub app_context_uninstalled: bool,
    /// Reason when not accepted
    #[prost(string, tag = "2")]
    pub app_context_uninstall_message: String,
}

/// `readynotify.Topic`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Topic {
    /// Subscriber name
    #[prost(string, tag = "1")]
    pub client_name: String,
    /// AppContext id
    #[prost(string, tag = "2")]
    pub app_context: String,
}

/// `readynotify.Notification`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Notification {
    /// AppContext whose status changed
    #[prost(string, tag = "1")]
    pub app_context: String,
}

/// `readynotify.UnsubscribeResponse`
#[derive(Clone, PartialEq, prost::Message)]
pub struct UnsubscribeResponse {}

/// Fully qualified RPC paths
pub mod paths {
    /// `Installapp/InstallApp`
    pub const INSTALL_APP: &str = "/installapp.Installapp/InstallApp";
    /// `Installapp/UninstallApp`
    pub const UNINSTALL_APP: &str = "/installapp.Installapp/UninstallApp";
    /// `readyNotify/Alert`
    pub const ALERT: &str = "/readynotify.readyNotify/Alert";
    /// `readyNotify/Unsubscribe`
    pub const UNSUBSCRIBE: &str = "/readynotify.readyNotify/Unsubscribe";
}
