//! Field rules used by `#[derive(Validate)]` input structs

use rust_decimal::Decimal;
use validator::ValidationError;

fn rule(code: &'static str, result: Result<(), &'static str>) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        err
    })
}

pub(crate) fn sku(value: &str) -> Result<(), ValidationError> {
    rule("sku", shared::validate_sku(value))
}

pub(crate) fn unit_of_measure(value: &str) -> Result<(), ValidationError> {
    rule("unit_of_measure", shared::validate_unit_of_measure(value))
}

pub(crate) fn price(value: &Decimal) -> Result<(), ValidationError> {
    rule("price", shared::validate_price(*value))
}

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    rule("positive", shared::validate_positive_quantity(*value))
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return rule("non_negative", Err("Quantity cannot be negative"));
    }
    Ok(())
}

pub(crate) fn alternative_group(value: &str) -> Result<(), ValidationError> {
    rule("alternative_group", shared::validate_alternative_group(Some(value)))
}
