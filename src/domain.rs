use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Expense category shared by cash requests and expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Travel,
    Supplies,
    Miscellaneous,
    Equipment,
    Training,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Travel,
        Category::Supplies,
        Category::Miscellaneous,
        Category::Equipment,
        Category::Training,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Travel => "Travel",
            Category::Supplies => "Supplies",
            Category::Miscellaneous => "Miscellaneous",
            Category::Equipment => "Equipment",
            Category::Training => "Training",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL.into_iter().find(|c| c.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a cash request. Transitions are not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Completed => "Completed",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL.into_iter().find(|c| c.as_str() == s).ok_or(())
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
