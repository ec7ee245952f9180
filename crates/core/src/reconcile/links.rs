//! Public deep links into the registry UI.
//!
//! Downstream tooling parses these links, so their shape is fixed:
//!
//! - `<host>/resources/<resource_id>#tree::archival_object_<ao_id>`
//! - `<host>/digital_objects/<do_id>#tree::digital_object_<do_id>`

use crate::registry::trailing_segment;

/// Public UI host used when none is configured.
pub const DEFAULT_PUBLIC_URL: &str = "https://archivesspace.library.nyu.edu";

/// Builds deep links from object URIs. Pure string composition.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    host: String,
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_URL)
    }
}

impl LinkBuilder {
    pub fn new(public_url: &str) -> Self {
        Self {
            host: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Link to an archival object within its resource tree.
    pub fn archival_object(&self, resource_id: &str, archival_object_uri: &str) -> String {
        format!(
            "{}/resources/{}#tree::archival_object_{}",
            self.host,
            resource_id,
            trailing_segment(archival_object_uri)
        )
    }

    /// Link to a digital object.
    pub fn digital_object(&self, digital_object_uri: &str) -> String {
        let id = trailing_segment(digital_object_uri);
        format!("{}/digital_objects/{}#tree::digital_object_{}", self.host, id, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archival_object_link() {
        let links = LinkBuilder::default();
        assert_eq!(
            links.archival_object("1234", "/repositories/2/archival_objects/100"),
            "https://archivesspace.library.nyu.edu/resources/1234#tree::archival_object_100"
        );
    }

    #[test]
    fn test_digital_object_link() {
        let links = LinkBuilder::default();
        assert_eq!(
            links.digital_object("/repositories/2/digital_objects/55"),
            "https://archivesspace.library.nyu.edu/digital_objects/55#tree::digital_object_55"
        );
    }

    #[test]
    fn test_custom_host_trailing_slash() {
        let links = LinkBuilder::new("https://aspace.example.edu/");
        assert_eq!(
            links.digital_object("/repositories/2/digital_objects/7"),
            "https://aspace.example.edu/digital_objects/7#tree::digital_object_7"
        );
    }
}
