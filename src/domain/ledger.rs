use serde::{Deserialize, Serialize};

use super::{
    AmountOverflow, CardReceipt, CashPayment, Cents, CounterSale, PaymentMethod, SupplierPayment,
    Transaction, TransactionId, add_cents, sub_cents,
};

/// The day's open transactions, one list per kind, plus the suppliers seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingState {
    pub card_receipts: Vec<CardReceipt>,
    pub counter_sales: Vec<CounterSale>,
    pub supplier_payments: Vec<SupplierPayment>,
    pub cash_payments: Vec<CashPayment>,
    #[serde(default)]
    pub recurring_suppliers: Vec<String>,
}

impl WorkingState {
    /// Append a transaction to the list matching its kind. Supplier and cash
    /// payments register their counterparty as a recurring supplier.
    pub fn push(&mut self, transaction: Transaction) {
        match transaction {
            Transaction::CardReceipt(r) => self.card_receipts.push(r),
            Transaction::CounterSale(s) => self.counter_sales.push(s),
            Transaction::SupplierPayment(p) => {
                self.remember_supplier(&p.supplier);
                self.supplier_payments.push(p);
            }
            Transaction::CashPayment(p) => {
                self.remember_supplier(&p.payee);
                self.cash_payments.push(p);
            }
        }
    }

    /// Remove a transaction by id from whichever list holds it.
    pub fn remove(&mut self, id: TransactionId) -> Option<Transaction> {
        if let Some(pos) = self.card_receipts.iter().position(|t| t.id == id) {
            return Some(self.card_receipts.remove(pos).into());
        }
        if let Some(pos) = self.counter_sales.iter().position(|t| t.id == id) {
            return Some(self.counter_sales.remove(pos).into());
        }
        if let Some(pos) = self.supplier_payments.iter().position(|t| t.id == id) {
            return Some(self.supplier_payments.remove(pos).into());
        }
        if let Some(pos) = self.cash_payments.iter().position(|t| t.id == id) {
            return Some(self.cash_payments.remove(pos).into());
        }
        None
    }

    pub fn remember_supplier(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && !self.recurring_suppliers.iter().any(|s| s == name) {
            self.recurring_suppliers.push(name.to_string());
        }
    }

    /// All transactions across the four lists, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self
            .card_receipts
            .iter()
            .cloned()
            .map(Transaction::from)
            .chain(self.counter_sales.iter().cloned().map(Transaction::from))
            .chain(self.supplier_payments.iter().cloned().map(Transaction::from))
            .chain(self.cash_payments.iter().cloned().map(Transaction::from))
            .collect();
        all.sort_by_key(|t| t.timestamp());
        all
    }

    pub fn record_count(&self) -> usize {
        self.card_receipts.len()
            + self.counter_sales.len()
            + self.supplier_payments.len()
            + self.cash_payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Clear the four transaction lists. Recurring suppliers survive the reset.
    pub fn cleared(&self) -> Self {
        Self {
            recurring_suppliers: self.recurring_suppliers.clone(),
            ..Self::default()
        }
    }
}

/// Totals for one set of working lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Gross card receipts before processor fees
    pub card_gross: Cents,
    pub card_fees: Cents,
    pub card_net: Cents,
    pub counter_cash: Cents,
    pub counter_transfer: Cents,
    pub supplier_cash: Cents,
    pub supplier_transfer: Cents,
    pub cash_payments: Cents,

    pub cash_income: Cents,
    pub transfer_income: Cents,
    pub cash_expense: Cents,
    pub transfer_expense: Cents,
    pub balance_cash: Cents,
    pub balance_transfer: Cents,

    /// Supplier invoices recorded but not yet settled (included in the expenses above)
    pub pending_supplier: Cents,
    pub record_count: usize,
}

impl Summary {
    pub fn total_income(&self) -> Cents {
        self.cash_income + self.transfer_income
    }

    pub fn total_expense(&self) -> Cents {
        self.cash_expense + self.transfer_expense
    }

    pub fn net_balance(&self) -> Cents {
        self.balance_cash + self.balance_transfer
    }
}

/// Fold the four working lists into per-method totals.
///
/// Card receipts count at their net amount and always land on the transfer
/// side; counter sales and supplier payments follow their settlement method;
/// cash payments always leave the till. Every total, including the ones the
/// accessor methods derive, is checked to fit in `Cents`.
pub fn compute_summary(state: &WorkingState) -> Result<Summary, AmountOverflow> {
    let mut summary = Summary::default();

    for receipt in &state.card_receipts {
        summary.card_gross = add_cents(summary.card_gross, receipt.amount_cents)?;
        summary.card_fees = add_cents(summary.card_fees, receipt.fee_cents)?;
        summary.card_net = add_cents(
            summary.card_net,
            sub_cents(receipt.amount_cents, receipt.fee_cents)?,
        )?;
    }

    for sale in &state.counter_sales {
        let (cash, transfer) = sale.settlement.split(sale.amount_cents);
        summary.counter_cash = add_cents(summary.counter_cash, cash)?;
        summary.counter_transfer = add_cents(summary.counter_transfer, transfer)?;
    }

    for payment in &state.supplier_payments {
        match payment.method {
            PaymentMethod::Cash => {
                summary.supplier_cash = add_cents(summary.supplier_cash, payment.amount_cents)?
            }
            PaymentMethod::Transfer => {
                summary.supplier_transfer =
                    add_cents(summary.supplier_transfer, payment.amount_cents)?
            }
        }
        if payment.status.is_outstanding() {
            summary.pending_supplier = add_cents(summary.pending_supplier, payment.amount_cents)?;
        }
    }

    summary.cash_payments = state
        .cash_payments
        .iter()
        .try_fold(0, |total, p| add_cents(total, p.amount_cents))?;

    summary.cash_income = summary.counter_cash;
    summary.transfer_income = add_cents(summary.card_net, summary.counter_transfer)?;
    summary.cash_expense = add_cents(summary.supplier_cash, summary.cash_payments)?;
    summary.transfer_expense = summary.supplier_transfer;
    summary.balance_cash = sub_cents(summary.cash_income, summary.cash_expense)?;
    summary.balance_transfer = sub_cents(summary.transfer_income, summary.transfer_expense)?;
    summary.record_count = state.record_count();

    add_cents(summary.cash_income, summary.transfer_income)?;
    add_cents(summary.cash_expense, summary.transfer_expense)?;
    add_cents(summary.balance_cash, summary.balance_transfer)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::domain::{PaymentStatus, Settlement};

    fn example_state() -> WorkingState {
        let now = Utc::now();
        let mut state = WorkingState::default();
        state.push(CardReceipt::new("Amoladora", 100, 5, now).into());
        state.push(CounterSale::new("Clavos", 50, Settlement::Cash, now).into());
        state.push(SupplierPayment::new("Acme", "Factura 1", 30, PaymentMethod::Cash, now).into());
        state.push(CashPayment::new("Flete", "Envío", 10, now).into());
        state
    }

    #[test]
    fn test_compute_summary_empty() {
        assert_eq!(compute_summary(&WorkingState::default()), Ok(Summary::default()));
    }

    #[test]
    fn test_compute_summary_worked_example() {
        let summary = compute_summary(&example_state()).unwrap();

        assert_eq!(summary.transfer_income, 95);
        assert_eq!(summary.cash_income, 50);
        assert_eq!(summary.cash_expense, 40);
        assert_eq!(summary.transfer_expense, 0);
        assert_eq!(summary.balance_cash, 10);
        assert_eq!(summary.balance_transfer, 95);
        assert_eq!(summary.card_fees, 5);
        assert_eq!(summary.record_count, 4);
    }

    #[test]
    fn test_compute_summary_is_pure() {
        let state = example_state();
        let before = state.clone();

        let first = compute_summary(&state).unwrap();
        let second = compute_summary(&state).unwrap();

        assert_eq!(first, second);
        assert_eq!(state, before);
    }

    #[test]
    fn test_balances_match_income_minus_expense() {
        let now = Utc::now();
        let mut state = example_state();
        state.push(CounterSale::new("Pala", 700, Settlement::Transfer, now).into());
        state.push(CounterSale::new("Cable", 900, Settlement::Mixed { cash_cents: 200 }, now).into());
        state.push(
            SupplierPayment::new("Ferrosur", "Pedido", 450, PaymentMethod::Transfer, now).into(),
        );

        let summary = compute_summary(&state).unwrap();

        assert_eq!(
            summary.balance_cash + summary.balance_transfer,
            summary.total_income() - summary.total_expense()
        );
        assert_eq!(summary.cash_income, 50 + 200);
        assert_eq!(summary.transfer_income, 95 + 700 + 700);
    }

    #[test]
    fn test_pending_supplier_total() {
        let now = Utc::now();
        let due = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let mut state = WorkingState::default();
        state.push(
            SupplierPayment::new("Acme", "Factura 2", 1200, PaymentMethod::Transfer, now)
                .with_status(PaymentStatus::Overdue, Some(due))
                .into(),
        );
        state.push(SupplierPayment::new("Acme", "Factura 3", 800, PaymentMethod::Cash, now).into());

        let summary = compute_summary(&state).unwrap();
        assert_eq!(summary.pending_supplier, 1200);
        assert_eq!(summary.total_expense(), 2000);
    }

    #[test]
    fn test_totals_past_cents_range_are_an_error() {
        let now = Utc::now();
        let huge = Cents::MAX / 2 + 1;
        let mut state = WorkingState::default();
        state.push(CounterSale::new("Lote A", huge, Settlement::Cash, now).into());
        state.push(CounterSale::new("Lote B", huge, Settlement::Cash, now).into());

        assert_eq!(compute_summary(&state), Err(AmountOverflow));
    }

    #[test]
    fn test_push_registers_recurring_suppliers_once() {
        let now = Utc::now();
        let mut state = WorkingState::default();
        state.push(SupplierPayment::new("Acme", "F1", 100, PaymentMethod::Cash, now).into());
        state.push(SupplierPayment::new("Acme", "F2", 100, PaymentMethod::Cash, now).into());
        state.push(CashPayment::new("Plomero", "Arreglo", 100, now).into());

        assert_eq!(state.recurring_suppliers, vec!["Acme", "Plomero"]);
    }

    #[test]
    fn test_remove_and_cleared() {
        let mut state = example_state();
        let id = state.counter_sales[0].id;

        let removed = state.remove(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(state.remove(id).is_none());
        assert_eq!(state.record_count(), 3);

        let cleared = state.cleared();
        assert!(cleared.is_empty());
        assert_eq!(cleared.recurring_suppliers, state.recurring_suppliers);
    }
}
