//! Human-readable failure notices.

use crate::models::{GovernedConnection, Owner};

/// Everything a failure notice talks about.
#[derive(Debug, Clone, Copy)]
pub struct FailureNotice<'a> {
    pub connection: &'a GovernedConnection,
    pub database_id: &'a str,
    pub database_name: Option<&'a str>,
    pub error_message: &'a str,
}

/// Subject line for a failure notice.
pub fn subject(connection: &GovernedConnection) -> String {
    format!("Connection test failed: {}", connection.name)
}

/// Compose the notice body addressed to the given owners.
pub fn compose_message(notice: &FailureNotice<'_>, owners: &[&Owner]) -> String {
    let mut lines: Vec<String> = vec![
        "Hello,".into(),
        String::new(),
        "A scheduled test of a governed catalog connection has failed.".into(),
        String::new(),
        format!("Connection: {} ({})", notice.connection.name, notice.connection.id),
    ];
    if let Some(env) = &notice.connection.environment {
        lines.push(format!("Environment: {env}"));
    }
    lines.push(format!(
        "Database: {}",
        notice.database_name.unwrap_or(notice.database_id)
    ));
    lines.push(format!("Database ID: {}", notice.database_id));
    lines.push(String::new());

    lines.push("Error details:".into());
    lines.push(format!("  {}", notice.error_message));
    lines.push(String::new());

    match owners {
        [] => {}
        [owner] => {
            lines.push("You are receiving this notice as an owner of this database.".into());
            lines.push(format!("Owner: {}", owner.label()));
            lines.push(String::new());
        }
        many => {
            lines.push(format!(
                "This notice is sent to all {} owners of this database:",
                many.len()
            ));
            for (idx, owner) in many.iter().enumerate() {
                match &owner.email {
                    Some(email) if owner.label() != email => {
                        lines.push(format!("  {}. {} ({email})", idx + 1, owner.label()))
                    }
                    _ => lines.push(format!("  {}. {}", idx + 1, owner.label())),
                }
            }
            lines.push(String::new());
        }
    }

    lines.push(
        "Please review the connection settings and credentials to resolve this issue.".into(),
    );
    lines.push("If you need help, contact your catalog administrator.".into());
    lines.push(String::new());
    lines.push("Best regards,".into());
    lines.push("Catalog Refresh Guard".into());

    lines.join("\n")
}
