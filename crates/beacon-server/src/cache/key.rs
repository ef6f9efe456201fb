/// Sentinel name for the full registry snapshot.
pub const ALL_APPS: &str = "ALL_APPS";
/// Sentinel name for the incremental change set.
pub const ALL_APPS_DELTA: &str = "ALL_APPS_DELTA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Application,
    Vip,
    SVip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    Xml,
}

impl ContentType {
    pub const ALL: [ContentType; 2] = [ContentType::Json, ContentType::Xml];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub const ALL: [ApiVersion; 2] = [ApiVersion::V1, ApiVersion::V2];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcceptLevel {
    Full,
    Compact,
}

impl AcceptLevel {
    pub const ALL: [AcceptLevel; 2] = [AcceptLevel::Full, AcceptLevel::Compact];
}

/// Cache lookup key. Two keys are equal iff all fields are equal; a key
/// carrying regions has a canonical regionless sibling through
/// [`CacheKey::without_regions`], which invalidation uses to fan out to every
/// region-parameterized variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: EntityType,
    pub name: String,
    pub content: ContentType,
    pub version: ApiVersion,
    pub accept: AcceptLevel,
    pub regions: Option<Vec<String>>,
}

impl CacheKey {
    pub fn new(
        entity: EntityType,
        name: impl Into<String>,
        content: ContentType,
        version: ApiVersion,
        accept: AcceptLevel,
    ) -> Self {
        Self { entity, name: name.into(), content, version, accept, regions: None }
    }

    /// Region-parameterized variant; the region tuple is ordered and part of
    /// key identity.
    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = if regions.is_empty() { None } else { Some(regions) };
        self
    }

    pub fn has_regions(&self) -> bool {
        self.regions.is_some()
    }

    pub fn without_regions(&self) -> CacheKey {
        CacheKey { regions: None, ..self.clone() }
    }
}
