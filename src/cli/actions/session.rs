use crate::{
    cli::globals::{Connection, GlobalArgs},
    session::{SessionManager, SessionSnapshot, SessionStatus},
};
use anyhow::{Context, Result, anyhow};
use std::fmt::Write as _;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub connection: Connection,
}

/// Human readable rendering of a snapshot, one `key: value` per line.
#[must_use]
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = format!("status: {}\n", snapshot.status);

    if let Some(profile) = &snapshot.profile {
        let _ = writeln!(out, "id: {}", profile.id);
        let _ = writeln!(out, "name: {}", profile.name);
        let _ = writeln!(out, "phone: {}", profile.phone_number);
        let _ = writeln!(out, "face enrolled: {}", profile.face_enrolled);
        let _ = writeln!(out, "member since: {}", profile.created_at.to_rfc3339());
    } else if let Some(name) = &snapshot.saved_username {
        let _ = writeln!(out, "saved user: {name}");
    }

    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "error: {error}");
    }

    out
}

/// Turns a rejected session operation into an error carrying the message the
/// session recorded.
pub(crate) fn failure(session: &SessionManager, operation: &str) -> anyhow::Error {
    let message = session
        .snapshot()
        .error
        .unwrap_or_else(|| "Something went wrong. Please try again.".to_string());
    anyhow!("{operation} failed: {message}")
}

/// Restore the stored session and print where it stands.
/// # Errors
/// Returns an error if the client cannot be configured.
pub async fn status(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(&args.connection)?;
    debug!("Global args: {:?}", globals);

    globals.session.bootstrap().await;
    print!("{}", render(&globals.session.snapshot()));

    Ok(())
}

/// Fetch the profile of the signed-in user through the auth interceptor.
/// # Errors
/// Returns an error if nobody is signed in or the profile cannot be fetched.
pub async fn whoami(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(&args.connection)?;
    let session = &globals.session;

    if !session.bootstrap().await {
        return Err(anyhow!(
            "not signed in (status: {}), run `facegate login` first",
            session.status()
        ));
    }
    if !session.refresh_profile().await {
        return Err(failure(session, "whoami"));
    }

    print!("{}", render(&session.snapshot()));
    Ok(())
}

/// Full local logout.
/// # Errors
/// Returns an error if the credential store cannot be wiped.
pub async fn logout(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(&args.connection)?;
    let session = &globals.session;

    session.bootstrap().await;
    if session.status() == SessionStatus::Unauthenticated {
        println!("not signed in");
        return Ok(());
    }
    if !session.logout().await {
        return Err(failure(session, "logout"));
    }

    info!("local credentials removed");
    println!("signed out");
    Ok(())
}

/// Forget the remembered user of an expired session.
/// # Errors
/// Returns an error unless the session needs re-authentication.
pub async fn forget(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(&args.connection)?;
    let session = &globals.session;

    session.bootstrap().await;
    if session.status() == SessionStatus::Unauthenticated {
        println!("no saved user");
        return Ok(());
    }
    if !session.clear_saved_user().await {
        return Err(failure(session, "forget"));
    }

    println!("saved user forgotten");
    Ok(())
}

/// Administrative wipe of every enrolled user on the server.
/// # Errors
/// Returns an error if the server rejects the request.
pub async fn clear_database(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(&args.connection)?;

    globals
        .api
        .clear_database()
        .await
        .map_err(|err| anyhow!(err.user_message()))
        .context("could not clear the server database")?;

    info!(server = %globals.server_url, "server database cleared");
    println!("database cleared");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{api::UserProfile, cli::globals::StoreLocation, credentials::TokenPair};
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn profile() -> UserProfile {
        UserProfile {
            id: 7,
            name: "Alice".to_string(),
            phone_number: "+15550000".to_string(),
            face_enrolled: true,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn connection(server: &MockServer, store: &std::path::Path) -> Connection {
        Connection {
            server_url: server.uri(),
            store: StoreLocation::Directory(store.to_path_buf()),
        }
    }

    async fn seed(store: &std::path::Path, access: &str, name: Option<&str>) {
        let globals = GlobalArgs::new(&Connection {
            server_url: "http://localhost:1".to_string(),
            store: StoreLocation::Directory(store.to_path_buf()),
        })
        .unwrap();
        let pair = TokenPair::new(access, "refresh-1");
        globals
            .credentials
            .save_tokens(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();
        if let Some(name) = name {
            globals.credentials.save_username(name).await.unwrap();
        }
    }

    #[test]
    fn test_render_authenticated() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::Authenticated,
            saved_username: Some("Alice".to_string()),
            profile: Some(profile()),
            ..SessionSnapshot::default()
        };

        let out = render(&snapshot);
        assert!(out.starts_with("status: authenticated\n"));
        assert!(out.contains("name: Alice\n"));
        assert!(out.contains("face enrolled: true\n"));
        assert!(out.contains("member since: 2024-05-01T12:00:00+00:00\n"));
        assert!(!out.contains("saved user"));
    }

    #[test]
    fn test_render_needs_reauth_with_error() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::NeedsReauth,
            saved_username: Some("Alice".to_string()),
            error: Some("Session expired.".to_string()),
            ..SessionSnapshot::default()
        };

        assert_eq!(
            render(&snapshot),
            "status: needs re-authentication\nsaved user: Alice\nerror: Session expired.\n"
        );
    }

    #[tokio::test]
    async fn test_status_with_stored_session() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();
        seed(store.path(), "access-1", Some("Alice")).await;

        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "name": "Alice",
                "phone_number": "+15550000",
                "face_enrolled": true,
                "created_at": "2024-05-01T12:00:00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        status(Args {
            connection: connection(&server, store.path()),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_whoami_requires_session() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();

        let err = whoami(Args {
            connection: connection(&server, store.path()),
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("not signed in"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_wipes_store() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();
        seed(store.path(), "access-1", Some("Alice")).await;

        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "name": "Alice",
                "phone_number": "+15550000",
                "face_enrolled": true,
                "created_at": "2024-05-01T12:00:00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let connection = connection(&server, store.path());
        logout(Args {
            connection: connection.clone(),
        })
        .await
        .unwrap();

        let globals = GlobalArgs::new(&connection).unwrap();
        assert!(globals.credentials.tokens().await.unwrap().is_none());
        assert!(globals.credentials.username().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_without_session_is_a_no_op() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();

        logout(Args {
            connection: connection(&server, store.path()),
        })
        .await
        .unwrap();

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forget_saved_user() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();
        let connection = connection(&server, store.path());

        let globals = GlobalArgs::new(&connection).unwrap();
        globals.credentials.save_username("Alice").await.unwrap();

        forget(Args {
            connection: connection.clone(),
        })
        .await
        .unwrap();
        assert!(globals.credentials.username().await.unwrap().is_none());

        // Nothing left to forget is not an error.
        forget(Args { connection }).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_database_sends_bearer() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();
        seed(store.path(), "admin-token", None).await;

        Mock::given(method("DELETE"))
            .and(path("/auth/admin/clear"))
            .and(header("authorization", "Bearer admin-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        clear_database(Args {
            connection: connection(&server, store.path()),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_clear_database_forbidden() {
        let server = MockServer::start().await;
        let store = tempfile::tempdir().unwrap();

        Mock::given(method("DELETE"))
            .and(path("/auth/admin/clear"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Forbidden"})))
            .mount(&server)
            .await;

        let err = clear_database(Args {
            connection: connection(&server, store.path()),
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("could not clear"));
    }
}
