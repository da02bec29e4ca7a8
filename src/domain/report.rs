use std::fmt::Write;

use super::{DailySnapshot, format_currency};

/// Render the end-of-day message sent to the owner.
pub fn render_daily_report(snapshot: &DailySnapshot) -> String {
    let s = &snapshot.summary;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "CIERRE DIARIO - {}", snapshot.business_date.format("%d/%m/%Y"));
    let _ = writeln!(out);
    let _ = writeln!(out, "INGRESOS");
    let _ = writeln!(
        out,
        "  Cobros con tarjeta: {} (comisiones {})",
        format_currency(s.card_net),
        format_currency(s.card_fees)
    );
    let _ = writeln!(out, "  Mostrador efectivo: {}", format_currency(s.counter_cash));
    let _ = writeln!(
        out,
        "  Mostrador transferencia: {}",
        format_currency(s.counter_transfer)
    );
    let _ = writeln!(out, "EGRESOS");
    let _ = writeln!(
        out,
        "  Proveedores: {} efectivo / {} transferencia",
        format_currency(s.supplier_cash),
        format_currency(s.supplier_transfer)
    );
    let _ = writeln!(out, "  Pagos en efectivo: {}", format_currency(s.cash_payments));
    if s.pending_supplier > 0 {
        let _ = writeln!(out, "  Pendiente a proveedores: {}", format_currency(s.pending_supplier));
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Balance del día: efectivo {} / transferencia {}",
        format_currency(s.balance_cash),
        format_currency(s.balance_transfer)
    );
    let _ = writeln!(
        out,
        "Saldo acumulado: efectivo {} / transferencia {}",
        format_currency(snapshot.closing_balance.cash_cents),
        format_currency(snapshot.closing_balance.transfer_cents)
    );
    let _ = write!(out, "Movimientos: {}", s.record_count);

    out
}
