use nodewatch_common::types::{LiveProcess, SupervisorRecord, TenantIdentity};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A tenant whose directory entry, supervisor record and live process all line up.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledTenant {
    pub tenant: TenantIdentity,
    pub supervisor_record: SupervisorRecord,
    pub live_process: LiveProcess,
}

/// Result of one reconciliation pass. Output order is unspecified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub matched: Vec<ReconciledTenant>,
    /// Assigned by the directory but unknown to the supervisor: the tenant's
    /// service is down or was never started.
    pub tenants_without_supervisor_record: Vec<TenantIdentity>,
    /// Known to the supervisor but its expected process is not running:
    /// crashed, or not started yet.
    pub supervisor_records_without_process: Vec<SupervisorRecord>,
}

/// Joins the three tenant sources.
///
/// Directory tenants are matched to supervisor records by dns, then each
/// record's expected process id is looked up in the live process table.
/// Process names are not consulted: every tenant runs the same storage
/// binary, so only the pid tells instances apart. Supervisor records for
/// dns names the directory does not list are ignored.
///
/// Never fails: an empty source just moves entries into the "without" sets.
pub fn reconcile(
    directory_tenants: &[TenantIdentity],
    supervisor_records: &[SupervisorRecord],
    live_processes: &[LiveProcess],
) -> Reconciliation {
    let mut records_by_dns: HashMap<&str, &SupervisorRecord> =
        HashMap::with_capacity(supervisor_records.len());
    let processes_by_pid: HashMap<u32, &LiveProcess> = live_processes
        .iter()
        .map(|p| (p.process_id, p))
        .collect();

    for record in supervisor_records {
        records_by_dns
            .entry(record.dns.as_str())
            .and_modify(|current| {
                if prefer_record(record, current, &processes_by_pid) {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    let mut result = Reconciliation::default();
    for tenant in directory_tenants {
        let Some(record) = records_by_dns.get(tenant.dns.as_str()) else {
            result.tenants_without_supervisor_record.push(tenant.clone());
            continue;
        };
        match processes_by_pid.get(&record.expected_process_id) {
            Some(process) => result.matched.push(ReconciledTenant {
                tenant: tenant.clone(),
                supervisor_record: (*record).clone(),
                live_process: (*process).clone(),
            }),
            None => result
                .supervisor_records_without_process
                .push((*record).clone()),
        }
    }
    result
}

/// Tie-break for duplicate supervisor records with the same dns: a record
/// whose process is alive wins, then the lower pid. Records with the same
/// pid are ordered by the newest start time, then the fewest failed health
/// checks, then no pending restart. Every field takes part, so the winner
/// never depends on input order.
fn prefer_record(
    candidate: &SupervisorRecord,
    current: &SupervisorRecord,
    processes_by_pid: &HashMap<u32, &LiveProcess>,
) -> bool {
    let candidate_live = processes_by_pid.contains_key(&candidate.expected_process_id);
    let current_live = processes_by_pid.contains_key(&current.expected_process_id);
    let order = candidate_live
        .cmp(&current_live)
        .then_with(|| current.expected_process_id.cmp(&candidate.expected_process_id))
        .then_with(|| candidate.process_start_time.cmp(&current.process_start_time))
        .then_with(|| current.failed_health_checks.cmp(&candidate.failed_health_checks))
        .then_with(|| current.planned_restart.cmp(&candidate.planned_restart))
        .then_with(|| current.force_restart.cmp(&candidate.force_restart));
    order == Ordering::Greater
}

/// Sorted, serializable digest of a pass, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub directory_tenants: usize,
    pub matched: Vec<MatchedTenant>,
    pub tenants_without_supervisor_record: Vec<String>,
    pub supervisor_records_without_process: Vec<UnmatchedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MatchedTenant {
    pub dns: String,
    pub process_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnmatchedRecord {
    pub dns: String,
    pub expected_process_id: u32,
}

impl Reconciliation {
    pub fn summary(&self) -> ReconciliationSummary {
        let mut matched: Vec<MatchedTenant> = self
            .matched
            .iter()
            .map(|m| MatchedTenant {
                dns: m.tenant.dns.clone(),
                process_id: m.live_process.process_id,
            })
            .collect();
        matched.sort();

        let mut without_record: Vec<String> = self
            .tenants_without_supervisor_record
            .iter()
            .map(|t| t.dns.clone())
            .collect();
        without_record.sort();

        let mut without_process: Vec<UnmatchedRecord> = self
            .supervisor_records_without_process
            .iter()
            .map(|r| UnmatchedRecord {
                dns: r.dns.clone(),
                expected_process_id: r.expected_process_id,
            })
            .collect();
        without_process.sort();

        ReconciliationSummary {
            directory_tenants: matched.len() + without_record.len() + without_process.len(),
            matched,
            tenants_without_supervisor_record: without_record,
            supervisor_records_without_process: without_process,
        }
    }
}
