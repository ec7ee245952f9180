//! Registry record types.
//!
//! Only the fields the reconciliation needs are modelled; everything else in
//! the registry's JSON is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Instance type marking a link to a digital object.
pub const DIGITAL_OBJECT_INSTANCE: &str = "digital_object";

/// An archival object (a folder or item in a finding aid).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivalObject {
    /// Registry URI, e.g. `/repositories/2/archival_objects/100`.
    pub uri: String,
    /// Display title. Archival objects may be untitled.
    #[serde(default)]
    pub title: String,
    /// Archival description component identifier.
    #[serde(default)]
    pub component_id: String,
    /// Physical and digital representations attached to this object.
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl ArchivalObject {
    /// Iterates over the instances that link to a digital object, with
    /// each one's position among all instances.
    pub fn digital_object_instances(&self) -> impl Iterator<Item = (usize, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_digital_object())
    }
}

/// An instance attached to an archival object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    /// Instance type, e.g. `digital_object` or `mixed_materials`.
    pub instance_type: String,
    /// Reference to the linked digital object (digital object instances only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_object: Option<ObjectRef>,
}

impl Instance {
    /// Whether this instance links to a digital object.
    pub fn is_digital_object(&self) -> bool {
        self.instance_type == DIGITAL_OBJECT_INSTANCE
    }

    /// The referenced digital object URI, or an empty string if absent.
    pub fn digital_object_ref(&self) -> &str {
        self.digital_object
            .as_ref()
            .map(|r| r.reference.as_str())
            .unwrap_or_default()
    }
}

/// A `{"ref": "/repositories/..."}` link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectRef {
    #[serde(rename = "ref")]
    pub reference: String,
}

/// A digital object record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigitalObject {
    /// Registry URI, e.g. `/repositories/2/digital_objects/55`.
    pub uri: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Identifier expected to equal the work order's component id.
    #[serde(default)]
    pub digital_object_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_archival_object() {
        let json = r#"{
            "uri": "/repositories/2/archival_objects/100",
            "title": "Correspondence, 1962",
            "component_id": "ABC123",
            "level": "file",
            "instances": [
                {"instance_type": "mixed_materials", "sub_container": {"top_container": {"ref": "/repositories/2/top_containers/9"}}},
                {"instance_type": "digital_object", "digital_object": {"ref": "/repositories/2/digital_objects/55"}}
            ]
        }"#;
        let ao: ArchivalObject = serde_json::from_str(json).unwrap();
        assert_eq!(ao.instances.len(), 2);

        let digital: Vec<(usize, &Instance)> = ao.digital_object_instances().collect();
        assert_eq!(digital.len(), 1);
        assert_eq!(digital[0].0, 1);
        assert_eq!(
            digital[0].1.digital_object_ref(),
            "/repositories/2/digital_objects/55"
        );
    }

    #[test]
    fn test_deserialize_untitled_archival_object() {
        let json = r#"{"uri": "/repositories/2/archival_objects/7"}"#;
        let ao: ArchivalObject = serde_json::from_str(json).unwrap();
        assert!(ao.title.is_empty());
        assert!(ao.instances.is_empty());
    }

    #[test]
    fn test_deserialize_digital_object() {
        let json = r#"{
            "uri": "/repositories/2/digital_objects/55",
            "title": "Correspondence, 1962",
            "digital_object_id": "ABC123",
            "publish": true
        }"#;
        let digital_object: DigitalObject = serde_json::from_str(json).unwrap();
        assert_eq!(digital_object.digital_object_id, "ABC123");
    }
}
