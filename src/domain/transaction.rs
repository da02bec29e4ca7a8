use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, MAX_AMOUNT_CENTS};

pub type TransactionId = Uuid;

/// How a supplier payment was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" | "efectivo" => Some(PaymentMethod::Cash),
            "transfer" | "transferencia" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a counter sale was settled. A mixed sale is paid partly in cash,
/// the remainder by transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Settlement {
    Cash,
    Transfer,
    Mixed { cash_cents: Cents },
}

impl Settlement {
    pub fn label(&self) -> &'static str {
        match self {
            Settlement::Cash => "cash",
            Settlement::Transfer => "transfer",
            Settlement::Mixed { .. } => "mixed",
        }
    }

    /// Split a sale amount into its (cash, transfer) parts.
    pub fn split(&self, amount_cents: Cents) -> (Cents, Cents) {
        match *self {
            Settlement::Cash => (amount_cents, 0),
            Settlement::Transfer => (0, amount_cents),
            Settlement::Mixed { cash_cents } => (cash_cents, amount_cents - cash_cents),
        }
    }
}

/// Settlement state of a supplier invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Overdue => "overdue",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "paid" | "pagado" => Some(PaymentStatus::Paid),
            "pending" | "pendiente" => Some(PaymentStatus::Pending),
            "overdue" | "vencido" => Some(PaymentStatus::Overdue),
            _ => None,
        }
    }

    /// Pending and overdue invoices still owe money and must carry a due date.
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, PaymentStatus::Paid)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inbound payment cleared through the card/digital-wallet processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReceipt {
    pub id: TransactionId,
    pub description: String,
    /// Gross amount charged to the customer
    pub amount_cents: Cents,
    /// Processor commission withheld from the gross amount
    pub fee_cents: Cents,
    pub category: Option<String>,
    pub customer: Option<String>,
    /// Payment id assigned by the processor
    pub external_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CardReceipt {
    pub fn new(
        description: impl Into<String>,
        amount_cents: Cents,
        fee_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount_cents,
            fee_cents,
            category: None,
            customer: None,
            external_ref: None,
            timestamp,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Amount actually deposited: gross minus the processor fee.
    pub fn net_cents(&self) -> Cents {
        self.amount_cents - self.fee_cents
    }
}

/// In-person sale at the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSale {
    pub id: TransactionId,
    pub description: String,
    pub amount_cents: Cents,
    pub settlement: Settlement,
    pub category: Option<String>,
    pub customer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CounterSale {
    pub fn new(
        description: impl Into<String>,
        amount_cents: Cents,
        settlement: Settlement,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount_cents,
            settlement,
            category: None,
            customer: None,
            timestamp,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }
}

/// Payment of a supplier invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPayment {
    pub id: TransactionId,
    pub supplier: String,
    pub concept: String,
    pub amount_cents: Cents,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SupplierPayment {
    pub fn new(
        supplier: impl Into<String>,
        concept: impl Into<String>,
        amount_cents: Cents,
        method: PaymentMethod,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            supplier: supplier.into(),
            concept: concept.into(),
            amount_cents,
            method,
            status: PaymentStatus::Paid,
            due_date: None,
            category: None,
            timestamp,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus, due_date: Option<NaiveDate>) -> Self {
        self.status = status;
        self.due_date = due_date;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Cash handed out of the till for anything that isn't a supplier invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashPayment {
    pub id: TransactionId,
    pub payee: String,
    pub concept: String,
    pub amount_cents: Cents,
    pub category: Option<String>,
    pub received_by: Option<String>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CashPayment {
    pub fn new(
        payee: impl Into<String>,
        concept: impl Into<String>,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payee: payee.into(),
            concept: concept.into(),
            amount_cents,
            category: None,
            received_by: None,
            receipt_number: None,
            notes: None,
            timestamp,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_received_by(mut self, received_by: impl Into<String>) -> Self {
        self.received_by = Some(received_by.into());
        self
    }

    pub fn with_receipt_number(mut self, receipt_number: impl Into<String>) -> Self {
        self.receipt_number = Some(receipt_number.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Any of the four transaction kinds tracked by the daily ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    CardReceipt(CardReceipt),
    CounterSale(CounterSale),
    SupplierPayment(SupplierPayment),
    CashPayment(CashPayment),
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        match self {
            Transaction::CardReceipt(t) => t.id,
            Transaction::CounterSale(t) => t.id,
            Transaction::SupplierPayment(t) => t.id,
            Transaction::CashPayment(t) => t.id,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::CardReceipt(_) => TransactionKind::CardReceipt,
            Transaction::CounterSale(_) => TransactionKind::CounterSale,
            Transaction::SupplierPayment(_) => TransactionKind::SupplierPayment,
            Transaction::CashPayment(_) => TransactionKind::CashPayment,
        }
    }

    pub fn amount_cents(&self) -> Cents {
        match self {
            Transaction::CardReceipt(t) => t.amount_cents,
            Transaction::CounterSale(t) => t.amount_cents,
            Transaction::SupplierPayment(t) => t.amount_cents,
            Transaction::CashPayment(t) => t.amount_cents,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Transaction::CardReceipt(t) => t.timestamp,
            Transaction::CounterSale(t) => t.timestamp,
            Transaction::SupplierPayment(t) => t.timestamp,
            Transaction::CashPayment(t) => t.timestamp,
        }
    }

    /// Free-text label shown in listings: description for income, concept for expenses.
    pub fn label(&self) -> &str {
        match self {
            Transaction::CardReceipt(t) => &t.description,
            Transaction::CounterSale(t) => &t.description,
            Transaction::SupplierPayment(t) => &t.concept,
            Transaction::CashPayment(t) => &t.concept,
        }
    }

    /// Check the constraints every recorded transaction must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount_cents() <= 0 {
            return Err(ValidationError::NonPositiveAmount(self.amount_cents()));
        }
        if self.amount_cents() > MAX_AMOUNT_CENTS {
            return Err(ValidationError::AmountTooLarge(self.amount_cents()));
        }
        if self.label().trim().is_empty() {
            return Err(ValidationError::MissingField("description"));
        }

        match self {
            Transaction::CardReceipt(r) => {
                if r.fee_cents < 0 || r.fee_cents > r.amount_cents {
                    return Err(ValidationError::FeeOutOfRange {
                        fee: r.fee_cents,
                        amount: r.amount_cents,
                    });
                }
            }
            Transaction::CounterSale(s) => {
                if let Settlement::Mixed { cash_cents } = s.settlement {
                    if cash_cents <= 0 || cash_cents >= s.amount_cents {
                        return Err(ValidationError::MixedCashOutOfRange {
                            cash: cash_cents,
                            amount: s.amount_cents,
                        });
                    }
                }
            }
            Transaction::SupplierPayment(p) => {
                if p.supplier.trim().is_empty() {
                    return Err(ValidationError::MissingField("supplier"));
                }
                if p.status.is_outstanding() && p.due_date.is_none() {
                    return Err(ValidationError::MissingDueDate);
                }
            }
            Transaction::CashPayment(p) => {
                if p.payee.trim().is_empty() {
                    return Err(ValidationError::MissingField("payee"));
                }
            }
        }

        Ok(())
    }
}

impl From<CardReceipt> for Transaction {
    fn from(value: CardReceipt) -> Self {
        Transaction::CardReceipt(value)
    }
}

impl From<CounterSale> for Transaction {
    fn from(value: CounterSale) -> Self {
        Transaction::CounterSale(value)
    }
}

impl From<SupplierPayment> for Transaction {
    fn from(value: SupplierPayment) -> Self {
        Transaction::SupplierPayment(value)
    }
}

impl From<CashPayment> for Transaction {
    fn from(value: CashPayment) -> Self {
        Transaction::CashPayment(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    CardReceipt,
    CounterSale,
    SupplierPayment,
    CashPayment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::CardReceipt => "card_receipt",
            TransactionKind::CounterSale => "counter_sale",
            TransactionKind::SupplierPayment => "supplier_payment",
            TransactionKind::CashPayment => "cash_payment",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("amount must be positive, got {0} cents")]
    NonPositiveAmount(Cents),

    #[error("amount of {0} cents exceeds the per-movement limit")]
    AmountTooLarge(Cents),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("fee of {fee} cents is outside 0..={amount}")]
    FeeOutOfRange { fee: Cents, amount: Cents },

    #[error("cash part of a mixed sale ({cash} cents) must be between 0 and {amount} exclusive")]
    MixedCashOutOfRange { cash: Cents, amount: Cents },

    #[error("pending and overdue supplier payments need a due date")]
    MissingDueDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_receipt_net_is_amount_minus_fee() {
        let receipt = CardReceipt::new("Taladro", 10000, 500, Utc::now());
        assert_eq!(receipt.net_cents(), 9500);
    }

    #[test]
    fn test_settlement_split() {
        assert_eq!(Settlement::Cash.split(1000), (1000, 0));
        assert_eq!(Settlement::Transfer.split(1000), (0, 1000));
        assert_eq!(Settlement::Mixed { cash_cents: 300 }.split(1000), (300, 700));
    }

    #[test]
    fn test_payment_method_parses_spanish_labels() {
        assert_eq!(PaymentMethod::from_str("Efectivo"), Some(PaymentMethod::Cash));
        assert_eq!(
            PaymentMethod::from_str("transfer"),
            Some(PaymentMethod::Transfer)
        );
        assert_eq!(PaymentMethod::from_str("cheque"), None);
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let sale: Transaction = CounterSale::new("Tornillos", 0, Settlement::Cash, Utc::now()).into();
        assert_eq!(sale.validate(), Err(ValidationError::NonPositiveAmount(0)));
    }

    #[test]
    fn test_validate_rejects_amount_over_limit() {
        let at_limit: Transaction =
            CounterSale::new("Grupo electrógeno", MAX_AMOUNT_CENTS, Settlement::Transfer, Utc::now())
                .into();
        assert!(at_limit.validate().is_ok());

        let over: Transaction =
            CashPayment::new("Flete", "Envío", MAX_AMOUNT_CENTS + 1, Utc::now()).into();
        assert_eq!(
            over.validate(),
            Err(ValidationError::AmountTooLarge(MAX_AMOUNT_CENTS + 1))
        );
    }

    #[test]
    fn test_validate_rejects_blank_description() {
        let receipt: Transaction = CardReceipt::new("   ", 1000, 0, Utc::now()).into();
        assert_eq!(
            receipt.validate(),
            Err(ValidationError::MissingField("description"))
        );
    }

    #[test]
    fn test_validate_fee_range() {
        let receipt: Transaction = CardReceipt::new("Pintura", 1000, 1500, Utc::now()).into();
        assert!(matches!(
            receipt.validate(),
            Err(ValidationError::FeeOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_mixed_cash_portion() {
        let all_cash: Transaction = CounterSale::new(
            "Cemento",
            1000,
            Settlement::Mixed { cash_cents: 1000 },
            Utc::now(),
        )
        .into();
        assert!(matches!(
            all_cash.validate(),
            Err(ValidationError::MixedCashOutOfRange { .. })
        ));

        let split: Transaction = CounterSale::new(
            "Cemento",
            1000,
            Settlement::Mixed { cash_cents: 400 },
            Utc::now(),
        )
        .into();
        assert!(split.validate().is_ok());
    }

    #[test]
    fn test_pending_supplier_payment_needs_due_date() {
        let pending: Transaction =
            SupplierPayment::new("Acme", "Factura 12", 5000, PaymentMethod::Transfer, Utc::now())
                .with_status(PaymentStatus::Pending, None)
                .into();
        assert_eq!(pending.validate(), Err(ValidationError::MissingDueDate));

        let due = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let pending: Transaction =
            SupplierPayment::new("Acme", "Factura 12", 5000, PaymentMethod::Transfer, Utc::now())
                .with_status(PaymentStatus::Pending, Some(due))
                .into();
        assert!(pending.validate().is_ok());
    }

    #[test]
    fn test_transaction_json_carries_kind_tag() {
        let sale: Transaction =
            CounterSale::new("Llave", 2500, Settlement::Mixed { cash_cents: 1000 }, Utc::now())
                .into();
        let json = serde_json::to_value(&sale).unwrap();
        assert_eq!(json["kind"], "counter_sale");
        assert_eq!(json["settlement"]["method"], "mixed");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, sale);
    }
}
