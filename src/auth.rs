use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use tracing::{debug, warn};

use crate::limits::MAX_ACTOR_ID_LEN;
use crate::observability::AUTH_FAILURES_TOTAL;

/// One shared password for every login. The login's user name becomes the
/// booking actor, so it has to be usable as one.
#[derive(Debug)]
pub struct CourtbookAuthSource {
    password: String,
}

impl CourtbookAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

fn check_user(user: Option<&str>) -> Result<&str, &'static str> {
    match user {
        None | Some("") => Err("missing user name"),
        Some(u) if u.len() > MAX_ACTOR_ID_LEN => Err("user name too long"),
        Some(u) => Ok(u),
    }
}

#[async_trait]
impl AuthSource for CourtbookAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let user = check_user(login.user()).map_err(|reason| {
            metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
            warn!("login refused: {reason}");
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28000".into(),
                reason.to_string(),
            )))
        })?;
        debug!("login by {user:?} to {:?}", login.database());
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
