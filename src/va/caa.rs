//! CAA (Certification Authority Authorization) checker. §4.I.

use crate::error::{CaError, Result};
use crate::types::CaaResult;
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::rdata::caa::Value;
use hickory_resolver::proto::rr::{rdata::CAA, RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

/// Looks up CAA records for `domain`, walking up ancestor labels until
/// a non-empty record set is found (RFC 6844 tree-climbing), then
/// checks whether `issuer_domain` is permitted to issue.
pub async fn check(resolver: &TokioAsyncResolver, domain: &str, issuer_domain: &str) -> Result<CaaResult> {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();

    for start in 0..labels.len() {
        let candidate = format!("{}.", labels[start..].join("."));
        let lookup = match resolver.lookup(candidate, RecordType::CAA).await {
            Ok(lookup) => lookup,
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => continue,
                _ => {
                    return Err(CaError::Dnssec(e.to_string()));
                }
            },
        };

        let records: Vec<&CAA> = lookup
            .record_iter()
            .filter_map(|r| match r.data() {
                Some(RData::CAA(caa)) => Some(caa),
                _ => None,
            })
            .collect();

        if records.is_empty() {
            continue;
        }

        let mut valid = true;
        let issue_records: Vec<&CAA> = records.iter().filter(|c| c.tag().as_str() == "issue").copied().collect();

        if !issue_records.is_empty() {
            let permitted = issue_records.iter().any(|c| match c.value() {
                Value::Issuer(Some(name), _) => name.to_ascii().trim_end_matches('.') == issuer_domain,
                _ => false,
            });
            if !permitted {
                valid = false;
            }
        }

        const RECOGNIZED_TAGS: &[&str] = &["issue", "issuewild", "iodef"];
        if records
            .iter()
            .any(|c| c.issuer_critical() && !RECOGNIZED_TAGS.contains(&c.tag().as_str()))
        {
            valid = false;
        }

        return Ok(CaaResult { present: true, valid });
    }

    Ok(CaaResult { present: false, valid: true })
}
