//! Push notification metadata enums.

code_enum! {
    /// Gateway that delivered a push notification.
    pub enum GatewaySource {
        Apns = 2 => "apns",
        PushAmplification = 3 => "push_amplification",
    }
}

code_enum! {
    /// How the campaign behind a notification was sent.
    pub enum CampaignType {
        Normal = 0 => "normal",
        Scheduled = 1 => "scheduled",
    }
}

code_enum! {
    /// Backend-side delivery status of a notification.
    pub enum DeliveryStatus {
        Scheduled = 1 => "scheduled",
        Cancelled = 2 => "cancelled",
        Rendered = 3 => "rendered",
        Delivered = 4 => "delivered",
    }
}
