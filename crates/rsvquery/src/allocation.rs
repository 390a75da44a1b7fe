//! Decoding of the per-node report of a resource manager.
//!
//! Torque describes the cores occupied on a node as a comma-delimited list of
//! `<core-ranges>/<job-id>` segments, e.g. `9,11/1.srv,0-3/2.srv,4-8,10/3.srv`:
//! cores 9 and 11 belong to job `1.srv`, cores 0 to 3 to job `2.srv` and so on.
//! The number of used cores of a node is always recomputed from this list.
use std::collections::BTreeSet;

use nom::character::complete::char;
use nom::combinator::opt;
use nom::sequence::{pair, preceded};
use serde::{Deserialize, Serialize};

use crate::common::parser::{NomResult, consume_all, p_u32, parse_leading_u64};

/// Node attributes as reported by the resource manager, before any interpretation.
/// The default value stands for a node the resource manager does not know about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNodeFields {
    /// Number of cores of the node.
    pub ppn: String,
    /// Core allocation list, see the module documentation.
    pub jobs: String,
    /// Comma-joined node features.
    pub properties: String,
}

/// One `<core-ranges>/<job-id>` segment of an allocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSegment<'a> {
    pub ranges: Vec<&'a str>,
    pub job_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobAllocation {
    pub job_id: String,
    pub cores: u32,
}

/// Utilization of a single node. Only produced by [`decode_node`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeUtilization {
    ppn: u32,
    ppn_used: u32,
    props: BTreeSet<String>,
    jobs: Vec<JobAllocation>,
}

impl NodeUtilization {
    pub fn ppn(&self) -> u32 {
        self.ppn
    }

    /// Sum of the cores of all jobs running on the node.
    pub fn ppn_used(&self) -> u32 {
        self.ppn_used
    }

    pub fn props(&self) -> &BTreeSet<String> {
        &self.props
    }

    /// Distinct jobs in the order of their first appearance in the allocation list.
    pub fn jobs(&self) -> &[JobAllocation] {
        &self.jobs
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.job_id.as_str())
    }

    pub(crate) fn into_parts(self) -> (u32, u32, BTreeSet<String>, Vec<JobAllocation>) {
        (self.ppn, self.ppn_used, self.props, self.jobs)
    }
}

/// Decodes the raw attributes of a node.
///
/// Decoding is best effort: fragments of the allocation list that cannot be understood
/// are counted as zero cores.
pub fn decode_node(raw: &RawNodeFields) -> NodeUtilization {
    let mut jobs: Vec<JobAllocation> = Vec::new();
    for segment in scan_allocation_segments(&raw.jobs) {
        let cores = segment
            .ranges
            .iter()
            .map(|token| count_cores(token))
            .fold(0, u32::saturating_add);
        match jobs.iter_mut().find(|job| job.job_id == segment.job_id) {
            Some(job) => job.cores = job.cores.saturating_add(cores),
            None => jobs.push(JobAllocation {
                job_id: segment.job_id.to_string(),
                cores,
            }),
        }
    }

    let ppn_used = jobs.iter().map(|job| job.cores).fold(0, u32::saturating_add);
    NodeUtilization {
        ppn: u32::try_from(parse_leading_u64(&raw.ppn)).unwrap_or(u32::MAX),
        ppn_used,
        props: split_properties(&raw.properties),
        jobs,
    }
}

/// Splits an allocation list into its segments.
///
/// Range tokens are collected until a token carrying a `/<job-id>` suffix closes the
/// segment. Text that is not a range resets the collected tokens and range tokens
/// without a job at the end of the list are dropped.
pub fn scan_allocation_segments(text: &str) -> Vec<AllocationSegment<'_>> {
    let mut segments = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for item in text.split(',').map(str::trim) {
        if item.is_empty() {
            continue;
        }
        match item.split_once('/') {
            Some((head, job_id)) => {
                let range = trailing_range(head);
                if range.len() != head.len() {
                    pending.clear();
                }
                let job_id = job_id.trim();
                if range.is_empty() || job_id.is_empty() {
                    pending.clear();
                    continue;
                }
                pending.push(range);
                segments.push(AllocationSegment {
                    ranges: std::mem::take(&mut pending),
                    job_id,
                });
            }
            None if item.chars().all(is_range_char) => pending.push(item),
            None => pending.clear(),
        }
    }
    segments
}

fn is_range_char(c: char) -> bool {
    c.is_ascii_digit() || c == '-'
}

/// The longest suffix of `text` made of range characters.
fn trailing_range(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .find(|(_, c)| !is_range_char(*c))
        .map(|(index, c)| index + c.len_utf8())
        .unwrap_or(0);
    &text[start..]
}

fn p_core_range(input: &str) -> NomResult<(u32, Option<u32>)> {
    pair(p_u32, opt(preceded(char('-'), p_u32)))(input)
}

/// Number of cores described by a single range token.
///
/// A core index counts as one core and `a-b` as `b - a + 1` cores. Tokens that are not
/// one of these forms (including reversed ranges) count as zero.
pub fn count_cores(token: &str) -> u32 {
    match consume_all(p_core_range, token) {
        Ok((_, None)) => 1,
        Ok((start, Some(end))) if end >= start => (end - start).saturating_add(1),
        _ => 0,
    }
}

fn split_properties(properties: &str) -> BTreeSet<String> {
    properties
        .split(',')
        .map(str::trim)
        .filter(|prop| !prop.is_empty())
        .map(|prop| prop.to_string())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(ppn: &str, jobs: &str, properties: &str) -> RawNodeFields {
        RawNodeFields {
            ppn: ppn.to_string(),
            jobs: jobs.to_string(),
            properties: properties.to_string(),
        }
    }

    fn job_cores(utilization: &NodeUtilization) -> Vec<(&str, u32)> {
        utilization
            .jobs()
            .iter()
            .map(|job| (job.job_id.as_str(), job.cores))
            .collect()
    }

    #[test]
    fn test_decode_mixed_ranges() {
        let utilization = decode_node(&raw("28", "9,11/jobA,0-3/jobB,4-8,10/jobC", ""));
        assert_eq!(
            utilization.job_ids().collect::<Vec<_>>(),
            vec!["jobA", "jobB", "jobC"]
        );
        assert_eq!(
            job_cores(&utilization),
            vec![("jobA", 2), ("jobB", 4), ("jobC", 6)]
        );
        assert_eq!(utilization.ppn_used(), 12);
        assert_eq!(utilization.ppn(), 28);
    }

    #[test]
    fn test_decode_empty_allocation() {
        let utilization = decode_node(&raw("12", "", ""));
        assert!(utilization.jobs().is_empty());
        assert_eq!(utilization.ppn_used(), 0);
        assert!(utilization.props().is_empty());
    }

    #[test]
    fn test_decode_is_pure() {
        let fields = raw("16", "0-7/1.srv,8/2.srv", "c12,ib");
        assert_eq!(decode_node(&fields), decode_node(&fields));
    }

    #[test]
    fn test_decode_missing_node() {
        let utilization = decode_node(&RawNodeFields::default());
        assert_eq!(utilization, NodeUtilization::default());
    }

    #[test]
    fn test_decode_core_per_segment() {
        let utilization = decode_node(&raw(
            "4",
            "0/7191718.oak-batch.osc.edu,1/7191718.oak-batch.osc.edu,2/7194494.oak-batch.osc.edu",
            "",
        ));
        assert_eq!(
            job_cores(&utilization),
            vec![
                ("7191718.oak-batch.osc.edu", 2),
                ("7194494.oak-batch.osc.edu", 1)
            ]
        );
        assert_eq!(utilization.ppn_used(), 3);
    }

    #[test]
    fn test_decode_spaced_list() {
        let utilization = decode_node(&raw("8", "0-1/1.srv, 2/2.srv, 3-5/1.srv", ""));
        assert_eq!(job_cores(&utilization), vec![("1.srv", 5), ("2.srv", 1)]);
    }

    #[test]
    fn test_decode_malformed_tokens() {
        // reversed and dangling ranges count as zero cores
        let utilization = decode_node(&raw("8", "5-2,3-/1.srv,0-1/2.srv", ""));
        assert_eq!(job_cores(&utilization), vec![("1.srv", 0), ("2.srv", 2)]);
        assert_eq!(utilization.ppn_used(), 2);
    }

    #[test]
    fn test_decode_ignores_trailing_ranges() {
        let utilization = decode_node(&raw("8", "0/1.srv,4-7", ""));
        assert_eq!(job_cores(&utilization), vec![("1.srv", 1)]);
    }

    #[test]
    fn test_decode_ignores_garbage() {
        let utilization = decode_node(&raw("8", "garbage,1-2,x3/1.srv,/2.srv,4/", ""));
        assert_eq!(job_cores(&utilization), vec![("1.srv", 1)]);
    }

    #[test]
    fn test_degenerate_range() {
        assert_eq!(count_cores("7"), 1);
        assert_eq!(count_cores("7-7"), 1);
        assert_eq!(count_cores("0-3"), 4);
        assert_eq!(count_cores("3-0"), 0);
        assert_eq!(count_cores("-"), 0);
        assert_eq!(count_cores("1-2-3"), 0);
        assert_eq!(count_cores(""), 0);
    }

    #[test]
    fn test_scan_segments() {
        assert_eq!(
            scan_allocation_segments("9,11/jobA,0-3/jobB"),
            vec![
                AllocationSegment {
                    ranges: vec!["9", "11"],
                    job_id: "jobA"
                },
                AllocationSegment {
                    ranges: vec!["0-3"],
                    job_id: "jobB"
                }
            ]
        );
    }

    #[test]
    fn test_job_id_keeps_slashes() {
        let segments = scan_allocation_segments("0-1/123[4].srv/x");
        assert_eq!(segments[0].job_id, "123[4].srv/x");
    }

    #[test]
    fn test_decode_properties() {
        let utilization = decode_node(&raw("x", "", "oak,c12,,gpu,"));
        assert_eq!(
            utilization.props().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["c12", "gpu", "oak"]
        );
        assert_eq!(utilization.ppn(), 0);
    }
}
