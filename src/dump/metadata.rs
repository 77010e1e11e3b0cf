// ABOUTME: Dump metadata blocks written at both ends of the output
// ABOUTME: Records tool version, server version, timestamp and parallelism

use chrono::{DateTime, Local};

/// Run-level facts written in the header and footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpMetadata {
    pub dump_version: String,
    pub server_version: String,
    pub completed_at: DateTime<Local>,
    pub parallelism: usize,
}

impl DumpMetadata {
    /// Capture the metadata for a job; the timestamp is taken once, here
    pub fn new(
        dump_version: impl Into<String>,
        server_version: impl Into<String>,
        parallelism: usize,
    ) -> Self {
        Self {
            dump_version: dump_version.into(),
            server_version: server_version.into(),
            completed_at: Local::now(),
            parallelism,
        }
    }

    pub fn header(&self) -> String {
        self.render("Dump started")
    }

    pub fn footer(&self) -> String {
        self.render("Dump completed")
    }

    fn render(&self, title: &str) -> String {
        format!(
            "--\n\
             -- PostgreSQL catalog dump: {title}\n\
             -- Dump version: {}\n\
             -- Server version: {}\n\
             -- Completed at: {}\n\
             -- Parallel workers: {}\n\
             --\n\n",
            self.dump_version,
            self.server_version,
            self.completed_at.format("%Y-%m-%d %H:%M:%S %z"),
            self.parallelism,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DumpMetadata {
        DumpMetadata {
            dump_version: "0.2.1".to_string(),
            server_version: "16.2".to_string(),
            completed_at: Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            parallelism: 8,
        }
    }

    #[test]
    fn test_header_block() {
        let header = fixed().header();
        assert!(header.starts_with("--\n-- PostgreSQL catalog dump: Dump started\n"));
        assert!(header.contains("-- Dump version: 0.2.1\n"));
        assert!(header.contains("-- Server version: 16.2\n"));
        assert!(header.contains("-- Completed at: 2026-01-02 03:04:05 "));
        assert!(header.contains("-- Parallel workers: 8\n"));
        assert!(header.ends_with("--\n\n"));
    }

    #[test]
    fn test_footer_shares_timestamp() {
        let meta = fixed();
        let header = meta.header();
        let footer = meta.footer();
        assert!(footer.contains("Dump completed"));
        let stamp = |block: &str| {
            block
                .lines()
                .find(|l| l.starts_with("-- Completed at:"))
                .map(str::to_string)
        };
        assert_eq!(stamp(&header), stamp(&footer));
    }
}
