use crate::search::SearchQuery;
use chrono::{DateTime, Utc};
use kfm_models::KafkaRequest;
use std::cmp::Ordering;
use std::str::FromStr;

/// Visibility boundary for caller-scoped reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    /// Everything owned by members of the organisation.
    Organisation(String),
    /// Only records whose owner matches exactly.
    Owner(String),
}

impl OwnerScope {
    pub fn matches(&self, request: &KafkaRequest) -> bool {
        match self {
            OwnerScope::Organisation(org) => request.organisation_id == *org,
            OwnerScope::Owner(owner) => request.owner == *owner,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub scope: Option<OwnerScope>,
    pub search: Option<SearchQuery>,
}

impl RequestFilter {
    pub fn scoped(scope: OwnerScope) -> Self {
        Self {
            scope: Some(scope),
            search: None,
        }
    }

    pub fn with_search(mut self, search: Option<SearchQuery>) -> Self {
        self.search = search;
        self
    }

    /// Whether a live (not soft-deleted) record passes this filter.
    pub fn matches(&self, request: &KafkaRequest) -> bool {
        if request.is_deleted() {
            return false;
        }
        if let Some(ref scope) = self.scope {
            if !scope.matches(request) {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            if !search.matches(request) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Name,
    Owner,
    OrganisationId,
    CloudProvider,
    Region,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Name => "name",
            SortColumn::Owner => "owner",
            SortColumn::OrganisationId => "organisation_id",
            SortColumn::CloudProvider => "cloud_provider",
            SortColumn::Region => "region",
            SortColumn::Status => "status",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
        }
    }

    fn compare(&self, a: &KafkaRequest, b: &KafkaRequest) -> Ordering {
        match self {
            SortColumn::Id => a.id.cmp(&b.id),
            SortColumn::Name => a.name.cmp(&b.name),
            SortColumn::Owner => a.owner.cmp(&b.owner),
            SortColumn::OrganisationId => {
                a.organisation_id.cmp(&b.organisation_id)
            }
            SortColumn::CloudProvider => a.cloud_provider.cmp(&b.cloud_provider),
            SortColumn::Region => a.region.cmp(&b.region),
            SortColumn::Status => a.status.as_str().cmp(b.status.as_str()),
            SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
            SortColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: SortColumn,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: SortColumn) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: SortColumn) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    pub fn compare(&self, a: &KafkaRequest, b: &KafkaRequest) -> Ordering {
        let ord = self.column.compare(a, b);
        if self.descending { ord.reverse() } else { ord }
    }

    /// Compare by each entry in turn, falling back to id so that paging is
    /// stable.
    pub fn compare_all(
        order_by: &[OrderBy],
        a: &KafkaRequest,
        b: &KafkaRequest,
    ) -> Ordering {
        order_by
            .iter()
            .map(|o| o.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order by argument: {0}")]
pub struct InvalidOrderBy(pub String);

impl FromStr for OrderBy {
    type Err = InvalidOrderBy;

    /// Accepts `"<column>"`, `"<column> asc"` or `"<column> desc"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let column = match parts.next().map(str::to_ascii_lowercase).as_deref()
        {
            Some("id") => SortColumn::Id,
            Some("name") => SortColumn::Name,
            Some("owner") => SortColumn::Owner,
            Some("organisation_id") => SortColumn::OrganisationId,
            Some("cloud_provider") => SortColumn::CloudProvider,
            Some("region") => SortColumn::Region,
            Some("status") => SortColumn::Status,
            Some("created_at") => SortColumn::CreatedAt,
            Some("updated_at") => SortColumn::UpdatedAt,
            _ => return Err(InvalidOrderBy(s.to_string())),
        };
        let descending =
            match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(_) => return Err(InvalidOrderBy(s.to_string())),
            };
        if parts.next().is_some() {
            return Err(InvalidOrderBy(s.to_string()));
        }
        Ok(Self { column, descending })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Paging {
    pub offset: u64,
    pub limit: u64,
}

/// Selects records for a bulk move to `deprovision`. Records already
/// deprovisioning or deleting are never selected.
#[derive(Debug, Clone, Default)]
pub struct DeprovisionFilter {
    pub owners: Option<Vec<String>>,
    pub created_before: Option<DateTime<Utc>>,
    pub exclude_ids: Vec<String>,
}

impl DeprovisionFilter {
    pub fn for_owners(owners: &[String]) -> Self {
        Self {
            owners: Some(owners.to_vec()),
            ..Default::default()
        }
    }

    pub fn created_before(
        cutoff: DateTime<Utc>,
        exclude_ids: Vec<String>,
    ) -> Self {
        Self {
            owners: None,
            created_before: Some(cutoff),
            exclude_ids,
        }
    }

    pub fn matches(&self, request: &KafkaRequest) -> bool {
        if request.is_deleted() || request.status.is_deleting() {
            return false;
        }
        if let Some(ref owners) = self.owners {
            if !owners.iter().any(|o| *o == request.owner) {
                return false;
            }
        }
        if let Some(cutoff) = self.created_before {
            if request.created_at > cutoff {
                return false;
            }
        }
        !self.exclude_ids.iter().any(|id| *id == request.id)
    }
}
