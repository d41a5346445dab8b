use chrono::NaiveDate;
use uuid::Uuid;

/// A bookable target: activities and facilities share the same schedule
/// and capacity behavior, so they are one sum type rather than two
/// parallel code paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Activity(Uuid),
    Facility(Uuid),
}

impl ResourceRef {
    pub fn id(&self) -> Uuid {
        match self {
            ResourceRef::Activity(id) | ResourceRef::Facility(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceRef::Activity(_) => "activity",
            ResourceRef::Facility(_) => "facility",
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// Reference data about a bookable resource.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    pub resource: ResourceRef,
    pub name: String,
    /// Plans entitled to book this resource. Empty means open to anyone,
    /// with or without a membership.
    pub allowed_plan_ids: Vec<Uuid>,
}

impl Resource {
    pub fn is_open_to_all(&self) -> bool {
        self.allowed_plan_ids.is_empty()
    }
}

/// A bookable time window on a given date with fixed capacity.
///
/// Invariant: `reserved <= capacity` at all times, including under
/// concurrent admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub id: String,
    pub label: String,
    pub capacity: u32,
    pub reserved: u32,
}

impl Slot {
    pub fn new(id: impl Into<String>, label: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            capacity,
            reserved: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.reserved)
    }
}

/// The slots a resource offers on a specific date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}
