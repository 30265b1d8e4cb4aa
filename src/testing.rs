//! In-memory repositories used by handler tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{DuplicateUser, UserRepo};
use crate::auth::repo_types::{NewUser, ProfileChanges, User};
use crate::auth::Role;
use crate::cash_requests::repo::CashRequestRepo;
use crate::cash_requests::repo_types::{
    CashRequestChanges, CashRequestFilter, CashRequestRow, NewCashRequest,
};
use crate::domain::RequestStatus;
use crate::expenses::repo::ExpenseRepo;
use crate::expenses::repo_types::{ExpenseChanges, ExpenseRow, NewExpense};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    cash_requests: Vec<CashRequestRow>,
    expenses: Vec<ExpenseRow>,
}

impl Tables {
    fn user(&self, id: Uuid) -> anyhow::Result<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("foreign key violation: user {id}"))
    }

    fn join_cash_request(&self, mut row: CashRequestRow) -> CashRequestRow {
        if let Ok(user) = self.user(row.user_id) {
            row.username = user.username.clone();
            row.full_name = user.full_name.clone();
        }
        row
    }

    fn join_expense(&self, mut row: ExpenseRow) -> ExpenseRow {
        if let Ok(user) = self.user(row.user_id) {
            row.username = user.username.clone();
            row.full_name = user.full_name.clone();
        }
        row.cash_request_description = row.linked_cash_request_id.and_then(|link| {
            self.cash_requests
                .iter()
                .find(|cr| cr.id == link)
                .map(|cr| cr.description.clone())
        });
        row
    }
}

/// Stores rows in insertion order and returns listings newest first.
#[derive(Clone, Default)]
pub struct MemoryRepo {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRepo {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_role(&self, user_id: Uuid, role: Role) {
        let mut t = self.lock();
        if let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) {
            user.role = role.as_str().to_string();
        }
    }

    /// Overwrites the stored amount token of a cash request.
    pub fn corrupt_cash_request_amount(&self, id: Uuid, token: &str) {
        let mut t = self.lock();
        if let Some(row) = t.cash_requests.iter_mut().find(|r| r.id == id) {
            row.amount_encrypted = token.to_string();
        }
    }

    pub fn stored_cash_request_amount(&self, id: Uuid) -> Option<String> {
        self.lock()
            .cash_requests
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.amount_encrypted.clone())
    }
}

#[async_trait]
impl UserRepo for MemoryRepo {
    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DuplicateUser::Email.into());
        }
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(DuplicateUser::Username.into());
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            department: user.department,
            role: Role::Member.as_str().to_string(),
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let mut t = self.lock();
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(department) = changes.department {
            user.department = Some(department);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}

fn matches(row: &CashRequestRow, filter: &CashRequestFilter) -> bool {
    filter.status.map_or(true, |s| row.status == s.as_str())
        && filter.department.as_ref().map_or(true, |d| &row.department == d)
}

#[async_trait]
impl CashRequestRepo for MemoryRepo {
    async fn create(&self, new: NewCashRequest) -> anyhow::Result<CashRequestRow> {
        let mut t = self.lock();
        t.user(new.user_id)?;
        let now = OffsetDateTime::now_utc();
        let row = CashRequestRow {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            amount_encrypted: new.amount_encrypted,
            department: new.department,
            date_needed: new.date_needed,
            description: new.description,
            category: new.category.as_str().to_string(),
            status: RequestStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
            username: String::new(),
            full_name: String::new(),
        };
        t.cash_requests.push(row.clone());
        Ok(t.join_cash_request(row))
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: CashRequestFilter,
    ) -> anyhow::Result<Vec<CashRequestRow>> {
        let t = self.lock();
        Ok(t.cash_requests
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id && matches(r, &filter))
            .map(|r| t.join_cash_request(r.clone()))
            .collect())
    }

    async fn list_all(&self, filter: CashRequestFilter) -> anyhow::Result<Vec<CashRequestRow>> {
        let t = self.lock();
        Ok(t.cash_requests
            .iter()
            .rev()
            .filter(|r| matches(r, &filter))
            .map(|r| t.join_cash_request(r.clone()))
            .collect())
    }

    async fn find(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<CashRequestRow>> {
        let t = self.lock();
        Ok(t.cash_requests
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .map(|r| t.join_cash_request(r.clone())))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: CashRequestChanges,
    ) -> anyhow::Result<Option<CashRequestRow>> {
        let mut t = self.lock();
        let Some(row) = t
            .cash_requests
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
        else {
            return Ok(None);
        };
        if let Some(v) = changes.amount_encrypted {
            row.amount_encrypted = v;
        }
        if let Some(v) = changes.department {
            row.department = v;
        }
        if let Some(v) = changes.date_needed {
            row.date_needed = v;
        }
        if let Some(v) = changes.description {
            row.description = v;
        }
        if let Some(v) = changes.category {
            row.category = v.as_str().to_string();
        }
        if let Some(v) = changes.status {
            row.status = v.as_str().to_string();
        }
        row.updated_at = OffsetDateTime::now_utc();
        let row = row.clone();
        Ok(Some(t.join_cash_request(row)))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.lock();
        let before = t.cash_requests.len();
        t.cash_requests.retain(|r| !(r.id == id && r.user_id == user_id));
        let removed = t.cash_requests.len() < before;
        if removed {
            for e in t.expenses.iter_mut().filter(|e| e.linked_cash_request_id == Some(id)) {
                e.linked_cash_request_id = None;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ExpenseRepo for MemoryRepo {
    async fn create(&self, new: NewExpense) -> anyhow::Result<ExpenseRow> {
        let mut t = self.lock();
        t.user(new.user_id)?;
        let now = OffsetDateTime::now_utc();
        let row = ExpenseRow {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            linked_cash_request_id: new.linked_cash_request_id,
            amount_encrypted: new.amount_encrypted,
            department: new.department,
            date_consumed: new.date_consumed,
            description: new.description,
            category: new.category.as_str().to_string(),
            created_at: now,
            updated_at: now,
            username: String::new(),
            full_name: String::new(),
            cash_request_description: None,
        };
        t.expenses.push(row.clone());
        Ok(t.join_expense(row))
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ExpenseRow>> {
        let t = self.lock();
        Ok(t.expenses
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .map(|e| t.join_expense(e.clone()))
            .collect())
    }

    async fn list_all(&self, department: Option<String>) -> anyhow::Result<Vec<ExpenseRow>> {
        let t = self.lock();
        Ok(t.expenses
            .iter()
            .rev()
            .filter(|e| department.as_ref().map_or(true, |d| &e.department == d))
            .map(|e| t.join_expense(e.clone()))
            .collect())
    }

    async fn list_by_cash_request(
        &self,
        cash_request_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpenseRow>> {
        let t = self.lock();
        Ok(t.expenses
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && e.linked_cash_request_id == Some(cash_request_id))
            .map(|e| t.join_expense(e.clone()))
            .collect())
    }

    async fn find(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<ExpenseRow>> {
        let t = self.lock();
        Ok(t.expenses
            .iter()
            .find(|e| e.id == id && e.user_id == user_id)
            .map(|e| t.join_expense(e.clone())))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: ExpenseChanges,
    ) -> anyhow::Result<Option<ExpenseRow>> {
        let mut t = self.lock();
        let Some(row) = t.expenses.iter_mut().find(|e| e.id == id && e.user_id == user_id) else {
            return Ok(None);
        };
        if let Some(v) = changes.linked_cash_request_id {
            row.linked_cash_request_id = Some(v);
        }
        if let Some(v) = changes.amount_encrypted {
            row.amount_encrypted = v;
        }
        if let Some(v) = changes.department {
            row.department = v;
        }
        if let Some(v) = changes.date_consumed {
            row.date_consumed = v;
        }
        if let Some(v) = changes.description {
            row.description = v;
        }
        if let Some(v) = changes.category {
            row.category = v.as_str().to_string();
        }
        row.updated_at = OffsetDateTime::now_utc();
        let row = row.clone();
        Ok(Some(t.join_expense(row)))
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.lock();
        let before = t.expenses.len();
        t.expenses.retain(|e| !(e.id == id && e.user_id == user_id));
        Ok(t.expenses.len() < before)
    }
}
