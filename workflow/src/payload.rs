//! Project attributes and stage command payloads.

use serde::{Deserialize, Serialize};
use tidemark_types::{ContentId, EcosystemType, GeoPoint, SubmitterId, TxId};

/// A media file submitted alongside a project upload, before it has been
/// handed to the content store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The inbound upload command payload: everything a new project submits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    pub name: String,
    /// Human-readable location label, e.g. "Sundarbans, West Bengal".
    pub location_label: String,
    pub geo: Option<GeoPoint>,
    pub area_sq_m: f64,
    pub ecosystem: EcosystemType,
    pub media: Vec<MediaUpload>,
    pub submitter: SubmitterId,
}

/// The project attributes retained on the workflow instance for later
/// stages. Owned exclusively by the orchestrator; collaborators receive
/// copies, never references. Media is kept as content-store handles, not
/// bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectPayload {
    pub name: String,
    pub location_label: String,
    pub geo: Option<GeoPoint>,
    pub area_sq_m: f64,
    pub ecosystem: EcosystemType,
    pub media_refs: Vec<ContentId>,
    pub submitter: SubmitterId,
}

impl ProjectPayload {
    /// Build the retained payload from an upload command plus the content
    /// ids minted for its media.
    pub fn from_upload(data: &ProjectData, media_refs: Vec<ContentId>) -> Self {
        Self {
            name: data.name.clone(),
            location_label: data.location_label.clone(),
            geo: data.geo,
            area_sq_m: data.area_sq_m,
            ecosystem: data.ecosystem,
            media_refs,
            submitter: data.submitter.clone(),
        }
    }
}

/// A completed marketplace sale of tokenized credits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub buyer: String,
    pub quantity: f64,
    pub total_paid: f64,
    pub transaction: TxId,
}

/// Final impact metrics reported at workflow completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetrics {
    pub co2_sequestered_t: f64,
    pub area_restored_ha: f64,
    pub community_beneficiaries: u64,
}
