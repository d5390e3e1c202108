//! Outgoing mail as files. Each message lands in its own file under the outbox
//! directory, which stands in for an SMTP relay.

use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Outbox {
    dir: PathBuf,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes one message and returns the file it was written to.
    pub fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let name = format!(
            "{}-{}.log",
            now.format("%Y%m%d-%H%M%S"),
            uuid::Uuid::new_v4().simple()
        );
        let path = self.dir.join(name);
        let message = format!(
            "To: {}\nSubject: {}\nDate: {}\n\n{}\n",
            to,
            subject,
            now.to_rfc2822(),
            body
        );
        std::fs::write(&path, message)?;

        log::info!("mail: wrote \"{}\" for {} to {}", subject, to, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_writes_message_file() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::new(dir.path().join("mail"));

        let path = outbox
            .send("ann@example.com", "Password reset", "Follow the link.", Utc::now())
            .unwrap();
        let message = std::fs::read_to_string(path).unwrap();

        assert!(message.starts_with("To: ann@example.com\nSubject: Password reset\n"));
        assert!(message.ends_with("\n\nFollow the link.\n"));
    }
}
