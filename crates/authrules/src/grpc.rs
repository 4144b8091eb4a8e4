//! gRPC glue: status mapping and per-request authorization.
//!
//! tonic interceptors are synchronous, so authorization runs inside the
//! service method instead:
//!
//! ```rust,ignore
//! async fn join_meeting(
//!     &self,
//!     mut request: Request<JoinRequest>,
//! ) -> Result<Response<JoinReply>, Status> {
//!     authorize_request(&self.rule, &mut request).await?;
//!     let claims = request.extensions().get::<Claims>();
//!     ...
//! }
//! ```

use crate::bearer;
use crate::http::AuthRejection;
use crate::rule::Rule;
use jwtauth::{AuthError, AuthErrorCode};
use tonic::{Code, Request, Status};
use tracing::instrument;

/// gRPC code for an authentication outcome.
pub fn grpc_code(code: AuthErrorCode) -> Code {
    match code {
        AuthErrorCode::Unknown => Code::Internal,
        AuthErrorCode::InvalidToken
        | AuthErrorCode::UntrustedSource
        | AuthErrorCode::BadSignature => Code::Unauthenticated,
        AuthErrorCode::InsufficientPermissions => Code::PermissionDenied,
    }
}

/// Map an error to a status with a generic message; the cause is logged.
pub fn status_for(err: &AuthError) -> Status {
    let code = grpc_code(err.code());
    if err.code() == AuthErrorCode::Unknown {
        tracing::error!(target: "authrules.grpc", error = %err, "Authorization failed");
    } else {
        tracing::debug!(target: "authrules.grpc", error = %err, "Request rejected");
    }
    let message = match code {
        Code::Unauthenticated => "Invalid or untrusted access token",
        Code::PermissionDenied => "Insufficient permissions",
        _ => "Internal error",
    };
    Status::new(code, message)
}

impl From<AuthRejection> for Status {
    fn from(rejection: AuthRejection) -> Self {
        status_for(&rejection.0)
    }
}

/// Authorize `request` against `rule`, storing the claims in its extensions.
///
/// # Errors
///
/// Returns the mapped `Status` when the request is refused.
#[instrument(skip_all, name = "authrules.grpc.authorize")]
pub async fn authorize_request<T>(rule: &Rule, request: &mut Request<T>) -> Result<(), Status> {
    let bearer = bearer::from_metadata(request.metadata()).map(str::to_owned);
    let claims = rule.check(bearer).await.map_err(|e| status_for(&e))?;
    if let Some(claims) = claims {
        request.extensions_mut().insert(claims);
    }
    Ok(())
}
