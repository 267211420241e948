//! Terminal and store domain entities (spec §3). Owned by this crate since
//! terminal lifecycle (open/close/sign-in) is what drives the business
//! counters C2 allocates from.

use chrono::{DateTime, Utc};
use pos_core::{Money, StaffRef};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TerminalStatus {
    Idle,
    Opened,
    Closed,
    Signedin,
}

// No `rename_all`: these structs round-trip through `bson::to_document`
// into the `terminals` collection, whose indexes (`collections.rs`) are
// declared on the Rust field names verbatim. The HTTP layer is
// responsible for camelCasing them on the way out (see
// `apps/api-server::dto::to_camel_value`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Store {
    pub tenant_id: String,
    pub store_code: String,
    /// `YYYYMMDD`, advanced by terminal open operations.
    pub business_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Terminal {
    pub tenant_id: String,
    pub store_code: String,
    pub terminal_no: i32,
    pub function_mode: String,
    pub status: TerminalStatus,
    pub business_date: String,
    /// Incremented on each open.
    pub open_counter: i64,
    /// Incremented on each close.
    pub business_counter: i64,
    pub current_staff: Option<StaffRef>,
    pub api_key: String,
    pub initial_cash_amount: Money,
    pub physical_cash_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Terminal {
    /// `tenant-store-no`, the derived key used to address a terminal's
    /// counter documents and cart sessions.
    pub fn terminal_id(&self) -> String {
        format!("{}-{}-{}", self.tenant_id, self.store_code, self.terminal_no)
    }

    pub fn new(tenant_id: impl Into<String>, store_code: impl Into<String>, terminal_no: i32, api_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Terminal {
            tenant_id: tenant_id.into(),
            store_code: store_code.into(),
            terminal_no,
            function_mode: "register".to_string(),
            status: TerminalStatus::Idle,
            business_date: now.format("%Y%m%d").to_string(),
            open_counter: 0,
            business_counter: 0,
            current_staff: None,
            api_key: api_key.into(),
            initial_cash_amount: Money::zero(),
            physical_cash_amount: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn open(&mut self, business_date: impl Into<String>, staff: StaffRef, initial_cash: Money) {
        self.status = TerminalStatus::Opened;
        self.business_date = business_date.into();
        self.open_counter += 1;
        self.current_staff = Some(staff);
        self.initial_cash_amount = initial_cash;
    }

    pub fn close(&mut self, physical_cash: Money) {
        self.status = TerminalStatus::Closed;
        self.business_counter += 1;
        self.physical_cash_amount = physical_cash;
    }

    pub fn sign_in(&mut self, staff: StaffRef) {
        self.status = TerminalStatus::Signedin;
        self.current_staff = Some(staff);
    }

    pub fn sign_out(&mut self) {
        self.status = TerminalStatus::Idle;
        self.current_staff = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_id_joins_the_natural_key() {
        let terminal = Terminal::new("A1234", "S01", 3, "key");
        assert_eq!(terminal.terminal_id(), "A1234-S01-3");
    }

    #[test]
    fn open_increments_open_counter_and_close_increments_business_counter() {
        let mut terminal = Terminal::new("A1234", "S01", 1, "key");
        let staff = StaffRef { staff_id: "st-1".to_string(), staff_name: Some("Alice".to_string()) };

        terminal.open("20260727", staff.clone(), Money::from_cents(10_000));
        assert_eq!(terminal.open_counter, 1);
        assert_eq!(terminal.status, TerminalStatus::Opened);

        terminal.close(Money::from_cents(9_500));
        assert_eq!(terminal.business_counter, 1);
        assert_eq!(terminal.status, TerminalStatus::Closed);
    }
}
