//! Scheduler job records.
//!
//! Each `.SC` script in the job archive sits next to a `.JB` XML record
//! written by the scheduler (queue, account, requested resources). The
//! record is optional metadata: scripts are counted whether or not it
//! exists.

use crate::error::JobXmlError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fields of a `.JB` record. Repeated tags keep their last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobMetadata {
    pub job_id: Option<String>,
    pub queue: Option<String>,
    pub job_name: Option<String>,
    pub job_state: Option<String>,
    pub account: Option<String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub nodes: Option<String>,
    pub walltime: Option<String>,
    pub pmem: Option<String>,
    /// Cores per node; 1 unless `nodes` says otherwise.
    pub ppn: u32,
    /// `haswell` or `ivybridge` when the `nodes` request names one.
    pub machine: Option<String>,
}

/// Path of the job record belonging to a `.SC` script.
pub fn companion_path(script: &Path) -> Result<PathBuf, JobXmlError> {
    match script.extension().and_then(|e| e.to_str()) {
        Some("SC") => Ok(script.with_extension("JB")),
        _ => Err(JobXmlError::NotAScript(script.to_path_buf())),
    }
}

/// Read and parse the job record belonging to a `.SC` script.
pub fn read_companion(script: &Path) -> Result<JobMetadata, JobXmlError> {
    let path = companion_path(script)?;
    let content = std::fs::read_to_string(&path).map_err(|source| JobXmlError::Io {
        path: path.clone(),
        source,
    })?;
    parse_job_xml(&content).map_err(|e| match e {
        JobXmlError::Xml { source, .. } => JobXmlError::Xml { path, source },
        other => other,
    })
}

/// Parse the text of a `.JB` record.
pub fn parse_job_xml(content: &str) -> Result<JobMetadata, JobXmlError> {
    let doc = roxmltree::Document::parse(content).map_err(|source| JobXmlError::Xml {
        path: PathBuf::new(),
        source,
    })?;

    let mut job = JobMetadata {
        ppn: 1,
        ..JobMetadata::default()
    };

    for node in doc.descendants().filter(|n| n.is_element()) {
        let Some(text) = node.text().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        let slot = match node.tag_name().name() {
            "Job_Id" | "jobid" => &mut job.job_id,
            "queue" => &mut job.queue,
            "Job_Name" => &mut job.job_name,
            "job_state" => &mut job.job_state,
            "Account_Name" => &mut job.account,
            "euser" => &mut job.user,
            "egroup" => &mut job.group,
            "nodes" => &mut job.nodes,
            "walltime" => &mut job.walltime,
            "pmem" => &mut job.pmem,
            _ => continue,
        };
        *slot = Some(text.to_string());
    }

    if let Some(nodes) = job.nodes.clone() {
        let (ppn, machine) = parse_nodes(&nodes)?;
        job.ppn = ppn;
        job.machine = machine;
    }

    Ok(job)
}

/// Split a `nodes` request such as `2:ppn=20:haswell` into cores per node
/// and machine type. The pieces after the node count may come in any order.
fn parse_nodes(nodes: &str) -> Result<(u32, Option<String>), JobXmlError> {
    let parts: Vec<&str> = nodes.split(':').collect();
    if parts.len() > 3 {
        return Err(JobXmlError::InvalidNodes(nodes.to_string()));
    }

    let mut ppn = 1;
    let mut machine = None;
    for part in &parts[1..] {
        match *part {
            "haswell" | "ivybridge" => machine = Some(part.to_string()),
            p => match p.strip_prefix("ppn=").map(str::parse::<u32>) {
                Some(Ok(n)) => ppn = n,
                Some(Err(_)) => debug!("ignoring malformed ppn in `{}`", nodes),
                None => {}
            },
        }
    }

    Ok((ppn, machine))
}
