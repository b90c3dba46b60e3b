use std::fmt;
use url::Url;

/// Which remote service a request targets; selects the pacing clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceIdentity {
    SourcePlatform,
    DestinationPlatform,
    Unclassified,
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SourcePlatform => "Mushroom Observer",
            Self::DestinationPlatform => "iNaturalist",
            Self::Unclassified => "unclassified host",
        };
        f.write_str(name)
    }
}

/// Known platform roots. A URL belongs to a platform when it shares the root's origin and
/// its path sits under the root's path.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    source: Url,
    destination: Url,
}

impl ServiceRegistry {
    pub fn new(source: Url, destination: Url) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn classify(&self, url: &Url) -> ServiceIdentity {
        if is_under(url, &self.source) {
            ServiceIdentity::SourcePlatform
        } else if is_under(url, &self.destination) {
            ServiceIdentity::DestinationPlatform
        } else {
            ServiceIdentity::Unclassified
        }
    }
}

fn is_under(url: &Url, root: &Url) -> bool {
    if url.origin() != root.origin() {
        return false;
    }
    let root_path = root.path().trim_end_matches('/');
    let path = url.path();
    root_path.is_empty()
        || path == root_path
        || path
            .strip_prefix(root_path)
            .is_some_and(|rest| rest.starts_with('/'))
}
