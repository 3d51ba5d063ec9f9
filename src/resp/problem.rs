use std::fmt::{Display, Formatter};
use std::io::Cursor;

use rocket::http::hyper::header::CONTENT_LANGUAGE;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    pub body: Map<String, Value>,
}

impl Problem {
    // TODO: Add problem type URIs
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }

    pub fn detail(mut self, value: impl ToString) -> Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert<V: Serialize>(mut self, key: impl ToString, value: V) -> Problem {
        self.body.insert(
            key.to_string(),
            serde_json::to_value(value).expect("data must be JSON serializable"),
        );
        self
    }

    pub fn insert_str(self, key: impl ToString, value: impl ToString) -> Problem {
        self.insert(key, value.to_string())
    }

    fn into_body(self) -> Map<String, Value> {
        let mut body = self.body;

        // `type`, `title` and `status` are required by rfc7807, `detail`
        // and `instance` optional.
        body.insert("type".to_string(), Value::from(self.type_uri));
        body.insert("title".to_string(), Value::from(self.title));
        body.insert("status".to_string(), Value::from(self.status.code));
        if let Some(detail) = self.detail {
            body.insert("detail".to_string(), Value::from(detail));
        }
        if let Some(instance) = self.instance_uri {
            body.insert("instance".to_string(), Value::from(instance));
        }

        body
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status;
        let body = serde_json::to_string(&self.into_body())
            .expect("JSON map keys and values must be JSON serializable");

        Response::build()
            .status(status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header(CONTENT_LANGUAGE.as_str(), "en")
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    /// A capability check failed. Never downgraded to a partial action.
    #[inline]
    pub fn forbidden(action: impl ToString) -> Problem {
        Problem::new_untyped(Status::Forbidden, "Not allowed.")
            .insert_str("required_capability", action)
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        tracing::warn!("storage error: {}", e);

        // Connectivity-shaped failures are worth a bounded client retry,
        // which is what 503 signals; everything else is a plain 500.
        let transient = matches!(
            e.kind.as_ref(),
            ErrorKind::Authentication { .. }
                | ErrorKind::DnsResolve { .. }
                | ErrorKind::Io(_)
                | ErrorKind::ConnectionPoolCleared { .. }
                | ErrorKind::ServerSelection { .. }
                | ErrorKind::InvalidTlsConfig { .. }
                | ErrorKind::IncompatibleServer { .. }
        );
        if transient {
            return Problem::new_untyped(
                Status::ServiceUnavailable,
                "Storage is temporarily unreachable.",
            );
        }

        let title = match e.kind.as_ref() {
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
                "There was a problem with a stored document."
            }
            ErrorKind::InvalidArgument { .. } | ErrorKind::BulkWrite(_) | ErrorKind::Command(_) => {
                "Storage was unable to process bad server request."
            }
            ErrorKind::Write(_) => {
                return Problem::new_untyped(
                    Status::InternalServerError,
                    "Storage failed while processing request.",
                )
                .detail("A write error occurred. Submitted data might not be properly stored.")
            }
            _ => "Storage failed while processing request.",
        };

        Problem::new_untyped(Status::InternalServerError, title)
    }
}

impl From<bson::de::Error> for Problem {
    fn from(_: bson::de::Error) -> Self {
        Problem::new_untyped(
            Status::InternalServerError,
            "An error occurred while processing BSON data.",
        )
    }
}

impl From<serde_json::Error> for Problem {
    fn from(_: serde_json::Error) -> Self {
        Problem::new_untyped(
            Status::InternalServerError,
            "An error occurred while processing JSON data.",
        )
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => {
                Problem::new_untyped(Status::Unauthorized, "Expired session token.")
            }
            _ => Problem::new_untyped(Status::Unauthorized, "Error while handling session token."),
        }
    }
}

impl From<std::io::Error> for Problem {
    fn from(_: std::io::Error) -> Self {
        Problem::new_untyped(Status::InternalServerError, "Server IO error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_names_the_missing_capability() {
        let problem = problems::forbidden("can_publish");

        assert_eq!(problem.status, Status::Forbidden);
        assert_eq!(
            problem.body.get("required_capability"),
            Some(&Value::String("can_publish".to_string()))
        );
    }

    #[test]
    fn rendered_bodies_carry_the_rfc7807_members() {
        let body = Problem::new_untyped(Status::NotFound, "Missing.")
            .detail("It is gone.")
            .into_body();

        assert_eq!(body.get("status"), Some(&Value::from(404)));
        assert_eq!(body.get("title"), Some(&Value::from("Missing.")));
        assert_eq!(body.get("detail"), Some(&Value::from("It is gone.")));
        assert_eq!(body.get("type"), Some(&Value::from("about:blank")));
    }

    #[test]
    fn expired_tokens_map_to_unauthorized() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert_eq!(Problem::from(err).status, Status::Unauthorized);
    }
}
