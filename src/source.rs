//! Lead data source.
//!
//! [`LeadSource`] is the seam between the board and the CRM backend. The
//! production implementation is [`HttpLeadSource`]; tests swap in an
//! in-process fake.
//!
//! The pipeline endpoint serves two shapes: a full lead list, a per-stage
//! summary map, or both at once. [`PipelineSnapshot`] carries whichever
//! arrived. Only a payload with an actual lead list may replace board
//! contents; a summary-only response must never be mistaken for an empty
//! board.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::board::models::{Lead, LeadId, Priority, Stage};
use crate::board::stats::StageSummary;
use crate::errors::SourceError;

/// What one fetch of the pipeline endpoint produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineSnapshot {
    /// Full lead list, when the payload carried one.
    pub leads: Option<Vec<Lead>>,
    /// Per-stage count/value summary, when the payload carried one.
    pub stage_summary: Option<BTreeMap<Stage, StageSummary>>,
}

#[async_trait]
pub trait LeadSource: Send + Sync {
    /// Fetch the current pipeline state from the server.
    async fn fetch_pipeline(&self) -> Result<PipelineSnapshot, SourceError>;

    /// Ask the server to move a lead to `stage`. `Ok(())` means the server
    /// accepted the change; any error means the optimistic move must be
    /// rolled back.
    async fn submit_stage_change(&self, id: LeadId, stage: Stage) -> Result<(), SourceError>;
}

/// HTTP implementation against the CRM's JSON endpoints.
///
/// Calls carry no client-side timeout: they resolve or reject with the
/// transport. Stage changes POST `{"status": "<Name>"}` with the
/// anti-forgery token in the `X-CSRFToken` header when one is configured.
#[derive(Debug, Clone)]
pub struct HttpLeadSource {
    client: reqwest::Client,
    base_url: String,
    forgery_token: Option<String>,
}

impl HttpLeadSource {
    pub fn new(base_url: impl Into<String>, forgery_token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            forgery_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl LeadSource for HttpLeadSource {
    async fn fetch_pipeline(&self) -> Result<PipelineSnapshot, SourceError> {
        let url = self.url("/api/pipeline/data");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                url: url.clone(),
                source: e,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SourceError::InvalidPayload(format!("invalid JSON: {}", e)))?;
        let snapshot = parse_pipeline_payload(value)?;
        debug!(
            leads = snapshot.leads.as_ref().map(|l| l.len()),
            has_summary = snapshot.stage_summary.is_some(),
            "fetched pipeline data"
        );
        Ok(snapshot)
    }

    async fn submit_stage_change(&self, id: LeadId, stage: Stage) -> Result<(), SourceError> {
        let url = self.url(&format!("/api/leads/{}/status", id));
        let mut req = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "status": stage.as_str() }));
        if let Some(token) = &self.forgery_token {
            req = req.header("X-CSRFToken", token);
        }
        let resp = req.send().await.map_err(|e| SourceError::Transport {
            url: url.clone(),
            source: e,
        })?;
        let status = resp.status();

        // Rejections arrive as a 4xx with a JSON body explaining why; read
        // the body before judging the HTTP status so the reason survives.
        let body: StatusChangeResponse = match resp.json().await {
            Ok(body) => body,
            Err(_) => {
                return Err(SourceError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
        };
        if body.success {
            debug!(lead_id = %id, stage = %stage, "stage change accepted");
            Ok(())
        } else {
            Err(SourceError::Rejected(body.message.unwrap_or_else(|| {
                format!("server returned status {}", status.as_u16())
            })))
        }
    }
}

/// Server's verdict on a stage change.
#[derive(Debug, Deserialize)]
struct StatusChangeResponse {
    success: bool,
    message: Option<String>,
}

/// One lead record as the wire carries it. Everything optional here;
/// [`RawLead::validate`] decides what is actually required.
#[derive(Debug, Deserialize)]
struct RawLead {
    id: Option<i64>,
    name: Option<String>,
    phone: Option<String>,
    whatsapp: Option<String>,
    email: Option<String>,
    course: Option<String>,
    lead_source: Option<String>,
    status: Option<String>,
    quoted_amount: Option<f64>,
    last_contact_date: Option<NaiveDate>,
    next_followup_date: Option<NaiveDate>,
    priority: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl RawLead {
    /// Boundary validation: reject rather than silently default. Requires
    /// id, name, phone, and a known stage name; a quoted amount, when
    /// present, must be non-negative.
    fn validate(self) -> Result<Lead, SourceError> {
        let id = self
            .id
            .ok_or_else(|| SourceError::InvalidPayload("lead record missing id".to_string()))?;
        let invalid =
            |what: &str| SourceError::InvalidPayload(format!("lead {}: {}", id, what));

        let name = self.name.filter(|n| !n.is_empty()).ok_or_else(|| invalid("missing name"))?;
        let phone = self.phone.filter(|p| !p.is_empty()).ok_or_else(|| invalid("missing phone"))?;
        let status = self.status.ok_or_else(|| invalid("missing status"))?;
        let stage: Stage = status
            .parse()
            .map_err(|_| invalid(&format!("unknown stage '{}'", status)))?;
        if let Some(amount) = self.quoted_amount
            && amount < 0.0
        {
            return Err(invalid(&format!("negative quoted amount {}", amount)));
        }
        let priority = match self.priority {
            Some(p) => p
                .parse()
                .map_err(|_| invalid(&format!("unknown priority '{}'", p)))?,
            None => Priority::default(),
        };

        Ok(Lead {
            id: LeadId(id),
            name,
            phone,
            whatsapp: self.whatsapp,
            email: self.email,
            course: self.course,
            lead_source: self.lead_source,
            quoted_amount: self.quoted_amount,
            stage,
            last_contact_date: self.last_contact_date,
            next_followup_date: self.next_followup_date,
            priority,
            created_at: self.created_at,
            updated_at: None,
        })
    }
}

/// Interpret a pipeline payload. Top-level `leads` is the lead list; every
/// other key must name a stage and carry a count/value summary.
fn parse_pipeline_payload(value: serde_json::Value) -> Result<PipelineSnapshot, SourceError> {
    let serde_json::Value::Object(fields) = value else {
        return Err(SourceError::InvalidPayload(
            "expected a JSON object".to_string(),
        ));
    };

    let mut snapshot = PipelineSnapshot::default();
    let mut summary = BTreeMap::new();

    for (key, val) in fields {
        if key == "leads" {
            let raw: Vec<RawLead> = serde_json::from_value(val)
                .map_err(|e| SourceError::InvalidPayload(format!("leads array: {}", e)))?;
            let mut leads = Vec::with_capacity(raw.len());
            for record in raw {
                leads.push(record.validate()?);
            }
            snapshot.leads = Some(leads);
            continue;
        }
        let stage: Stage = key.parse().map_err(|_| {
            SourceError::InvalidPayload(format!("unknown stage '{}' in summary", key))
        })?;
        let slice: StageSummary = serde_json::from_value(val).map_err(|e| {
            SourceError::InvalidPayload(format!("summary for {}: {}", stage, e))
        })?;
        summary.insert(stage, slice);
    }

    if !summary.is_empty() {
        snapshot.stage_summary = Some(summary);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_only_payload() {
        let value = serde_json::json!({
            "New": {"count": 3, "total_value": 1500.0},
            "Quoted": {"count": 1, "total_value": 900.0}
        });
        let snapshot = parse_pipeline_payload(value).unwrap();
        assert!(snapshot.leads.is_none(), "summary must not become a lead list");
        let summary = snapshot.stage_summary.unwrap();
        assert_eq!(summary[&Stage::New].count, 3);
        assert_eq!(summary[&Stage::Quoted].total_value, 900.0);
    }

    #[test]
    fn test_parse_lead_list_payload() {
        let value = serde_json::json!({
            "leads": [{
                "id": 7,
                "name": "Asha Rao",
                "phone": "555-0101",
                "email": "asha@example.com",
                "status": "Quoted",
                "quoted_amount": 1200.5,
                "last_contact_date": "2025-03-10",
                "created_at": "2025-02-01T09:30:00Z"
            }]
        });
        let snapshot = parse_pipeline_payload(value).unwrap();
        let leads = snapshot.leads.unwrap();
        assert_eq!(leads.len(), 1);
        let lead = &leads[0];
        assert_eq!(lead.id, LeadId(7));
        assert_eq!(lead.stage, Stage::Quoted);
        assert_eq!(lead.quoted_amount, Some(1200.5));
        assert_eq!(
            lead.last_contact_date,
            NaiveDate::from_ymd_opt(2025, 3, 10)
        );
        assert_eq!(lead.priority, Priority::Normal);
        assert!(snapshot.stage_summary.is_none());
    }

    #[test]
    fn test_parse_payload_with_both_shapes() {
        let value = serde_json::json!({
            "leads": [
                {"id": 1, "name": "A", "phone": "1", "status": "New"}
            ],
            "New": {"count": 1, "total_value": 0.0}
        });
        let snapshot = parse_pipeline_payload(value).unwrap();
        assert_eq!(snapshot.leads.unwrap().len(), 1);
        assert!(snapshot.stage_summary.is_some());
    }

    #[test]
    fn test_parse_empty_object_carries_nothing() {
        let snapshot = parse_pipeline_payload(serde_json::json!({})).unwrap();
        assert!(snapshot.leads.is_none());
        assert!(snapshot.stage_summary.is_none());
    }

    #[test]
    fn test_parse_rejects_non_object_payload() {
        let err = parse_pipeline_payload(serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, SourceError::InvalidPayload(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_summary_stage() {
        let value = serde_json::json!({
            "Junk": {"count": 1, "total_value": 0.0}
        });
        let err = parse_pipeline_payload(value).unwrap_err();
        assert!(err.to_string().contains("Junk"));
    }

    #[test]
    fn test_validate_rejects_unknown_lead_stage() {
        let value = serde_json::json!({
            "leads": [{"id": 5, "name": "A", "phone": "1", "status": "Stalled"}]
        });
        let err = parse_pipeline_payload(value).unwrap_err();
        assert!(err.to_string().contains("Stalled"));
        assert!(err.to_string().contains("lead 5"));
    }

    #[test]
    fn test_validate_rejects_negative_quoted_amount() {
        let value = serde_json::json!({
            "leads": [{
                "id": 2, "name": "A", "phone": "1",
                "status": "Quoted", "quoted_amount": -50.0
            }]
        });
        let err = parse_pipeline_payload(value).unwrap_err();
        assert!(err.to_string().contains("negative quoted amount"));
    }

    #[test]
    fn test_validate_rejects_missing_required_fields() {
        for (payload, needle) in [
            (serde_json::json!({"leads": [{"name": "A", "phone": "1", "status": "New"}]}), "missing id"),
            (serde_json::json!({"leads": [{"id": 1, "phone": "1", "status": "New"}]}), "missing name"),
            (serde_json::json!({"leads": [{"id": 1, "name": "A", "status": "New"}]}), "missing phone"),
            (serde_json::json!({"leads": [{"id": 1, "name": "A", "phone": "1"}]}), "missing status"),
        ] {
            let err = parse_pipeline_payload(payload).unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "expected '{}' in '{}'",
                needle,
                err
            );
        }
    }

    #[test]
    fn test_validate_parses_wire_priority() {
        let value = serde_json::json!({
            "leads": [{
                "id": 3, "name": "A", "phone": "1",
                "status": "New", "priority": "urgent"
            }]
        });
        let snapshot = parse_pipeline_payload(value).unwrap();
        assert_eq!(snapshot.leads.unwrap()[0].priority, Priority::Urgent);
    }

    #[test]
    fn test_status_change_response_accepted() {
        let json = r#"{"success": true, "message": "Status updated successfully"}"#;
        let resp: StatusChangeResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.message.as_deref(), Some("Status updated successfully"));
    }

    #[test]
    fn test_status_change_response_rejected() {
        let json = r#"{"success": false, "message": "Invalid status"}"#;
        let resp: StatusChangeResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("Invalid status"));
    }

    #[test]
    fn test_http_source_normalizes_base_url() {
        let source = HttpLeadSource::new("http://crm.local/", None);
        assert_eq!(
            source.url("/api/pipeline/data"),
            "http://crm.local/api/pipeline/data"
        );
        let source = HttpLeadSource::new("http://crm.local", None);
        assert_eq!(
            source.url(&format!("/api/leads/{}/status", LeadId(9))),
            "http://crm.local/api/leads/9/status"
        );
    }
}
