use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::hub::NotificationHub;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub hub: Arc<NotificationHub>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let hub = Arc::new(NotificationHub::new(
            settings.push.clone(),
            &settings.email_status,
        ));
        Self::with_hub(settings, hub)
    }

    /// Build state around an existing hub, shared with background tasks
    pub fn with_hub(settings: Settings, hub: Arc<NotificationHub>) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            hub,
            start_time: Instant::now(),
        }
    }
}
