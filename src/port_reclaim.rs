use std::{
    collections::BTreeSet,
    io,
    process::{Command, Stdio},
    time::Duration,
};

use crate::process_control;

/// Port-to-process lookup plus termination, backed by OS tools in production.
pub trait PortProcessTable: Send + Sync {
    fn owners(&self, port: u16) -> Result<Vec<u32>, String>;
    fn terminate(&self, pid: u32) -> Result<(), String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortTable;

impl PortProcessTable for SystemPortTable {
    #[cfg(not(target_os = "windows"))]
    fn owners(&self, port: u16) -> Result<Vec<u32>, String> {
        let output = Command::new("lsof")
            .args(["-nP", "-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|error| lookup_error("lsof", error))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // lsof exits with 1 when nothing matches.
        if !output.status.success() && stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(parse_lsof_pids(&stdout))
    }

    #[cfg(target_os = "windows")]
    fn owners(&self, port: u16) -> Result<Vec<u32>, String> {
        let output = Command::new("netstat")
            .args(["-ano", "-p", "tcp"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|error| lookup_error("netstat", error))?;
        if !output.status.success() {
            return Err(format!("netstat exited with {}", output.status));
        }
        Ok(parse_netstat_pids(
            &String::from_utf8_lossy(&output.stdout),
            port,
        ))
    }

    fn terminate(&self, pid: u32) -> Result<(), String> {
        process_control::request_graceful_termination(pid)
    }
}

fn lookup_error(tool: &str, error: io::Error) -> String {
    if error.kind() == io::ErrorKind::NotFound {
        format!("'{tool}' is not available for port lookup")
    } else {
        format!("failed to run '{tool}': {error}")
    }
}

pub fn parse_lsof_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn parse_netstat_pids(output: &str, port: u16) -> Vec<u32> {
    let port_suffix = format!(":{port}");
    output
        .lines()
        .filter_map(|line| {
            let columns = line.split_whitespace().collect::<Vec<_>>();
            if columns.len() < 5 || !columns[0].eq_ignore_ascii_case("TCP") {
                return None;
            }
            if !columns[1].ends_with(&port_suffix) {
                return None;
            }
            columns[columns.len() - 1].parse::<u32>().ok()
        })
        .filter(|pid| *pid != 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReclaimReport {
    pub found: Vec<u32>,
    pub terminated: Vec<u32>,
    pub failures: Vec<String>,
}

impl ReclaimReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Terminates every process listening on `port` and returns without waiting.
///
/// Never fails: lookup and termination problems end up in the report.
pub fn reclaim_port_now(table: &dyn PortProcessTable, port: u16) -> ReclaimReport {
    let mut report = ReclaimReport::default();
    let own_pid = std::process::id();

    let owners = match table.owners(port) {
        Ok(owners) => owners,
        Err(error) => {
            tracing::warn!(port, "port lookup failed: {error}");
            report.failures.push(error);
            return report;
        }
    };

    for pid in owners.into_iter().filter(|pid| *pid != own_pid) {
        report.found.push(pid);
        match table.terminate(pid) {
            Ok(()) => {
                tracing::info!(port, pid, "requested termination of process holding port");
                report.terminated.push(pid);
            }
            Err(error) => {
                tracing::warn!(port, pid, "failed to terminate process holding port: {error}");
                report.failures.push(format!("pid {pid}: {error}"));
            }
        }
    }
    report
}

/// Reclaims `port`, then waits `settle` so the OS can release it.
pub async fn reclaim_port(
    table: &dyn PortProcessTable,
    port: u16,
    settle: Duration,
) -> ReclaimReport {
    let report = reclaim_port_now(table, port);
    if report.found.is_empty() {
        return report;
    }

    tokio::time::sleep(settle).await;

    if !report.terminated.is_empty() {
        match table.owners(port) {
            Ok(remaining) if remaining.iter().any(|pid| *pid != std::process::id()) => {
                tracing::warn!(
                    port,
                    ?remaining,
                    "port is still occupied after reclaim; backend may fail to bind"
                );
            }
            Ok(_) => {}
            Err(error) => tracing::debug!(port, "port re-check failed: {error}"),
        }
    }
    report
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakePortTable {
        pub(crate) owners: Mutex<Vec<u32>>,
        pub(crate) fail_lookup: bool,
        pub(crate) fail_terminate: bool,
        pub(crate) lookups: Mutex<usize>,
        pub(crate) terminated: Mutex<Vec<u32>>,
    }

    impl PortProcessTable for FakePortTable {
        fn owners(&self, _port: u16) -> Result<Vec<u32>, String> {
            *self.lookups.lock().unwrap() += 1;
            if self.fail_lookup {
                return Err("lookup exploded".to_string());
            }
            Ok(self.owners.lock().unwrap().clone())
        }

        fn terminate(&self, pid: u32) -> Result<(), String> {
            if self.fail_terminate {
                return Err("permission denied".to_string());
            }
            self.terminated.lock().unwrap().push(pid);
            self.owners.lock().unwrap().retain(|owner| *owner != pid);
            Ok(())
        }
    }

    #[test]
    fn parse_lsof_pids_dedups_and_skips_noise() {
        assert_eq!(parse_lsof_pids("4242\n17\n4242\n\nnope\n0\n"), vec![17, 4242]);
        assert!(parse_lsof_pids("").is_empty());
    }

    #[test]
    fn parse_netstat_pids_matches_local_port_only() {
        let output = "\
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:5000           0.0.0.0:0              LISTENING       4120
  TCP    [::]:5000              [::]:0                 LISTENING       4120
  TCP    127.0.0.1:51234        127.0.0.1:5000         ESTABLISHED     9000
  TCP    0.0.0.0:50000          0.0.0.0:0              LISTENING       777
  UDP    0.0.0.0:5000           *:*                                    55
";
        assert_eq!(parse_netstat_pids(output, 5000), vec![4120]);
    }

    #[tokio::test]
    async fn reclaim_port_terminates_every_owner() {
        let table = FakePortTable::default();
        *table.owners.lock().unwrap() = vec![11, 22];

        let report = reclaim_port(&table, 5000, Duration::from_millis(1)).await;

        assert_eq!(report.found, vec![11, 22]);
        assert_eq!(report.terminated, vec![11, 22]);
        assert!(report.is_clean());
        assert_eq!(*table.terminated.lock().unwrap(), vec![11, 22]);
    }

    #[tokio::test]
    async fn reclaim_port_swallows_lookup_failure() {
        let table = FakePortTable {
            fail_lookup: true,
            ..FakePortTable::default()
        };

        let report = reclaim_port(&table, 5000, Duration::from_millis(1)).await;

        assert!(report.found.is_empty());
        assert_eq!(report.failures, vec!["lookup exploded".to_string()]);
    }

    #[tokio::test]
    async fn reclaim_port_swallows_termination_failure() {
        let table = FakePortTable {
            fail_terminate: true,
            ..FakePortTable::default()
        };
        *table.owners.lock().unwrap() = vec![33];

        let report = reclaim_port(&table, 5000, Duration::from_millis(1)).await;

        assert_eq!(report.found, vec![33]);
        assert!(report.terminated.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("pid 33"));
    }

    #[test]
    fn reclaim_port_now_never_targets_own_process() {
        let table = FakePortTable::default();
        *table.owners.lock().unwrap() = vec![std::process::id()];

        let report = reclaim_port_now(&table, 5000);

        assert!(report.found.is_empty());
        assert!(table.terminated.lock().unwrap().is_empty());
    }
}
