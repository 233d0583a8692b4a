//! Stock purchase gated by an approver
//!
//! `validate_order` checks the request; a bad request ends the thread with a
//! `validation_error` result and never asks anyone. A valid one moves to
//! `confirm_purchase`, which pauses with a yes/no question and only calls
//! the broker after an approval. The order is placed after the suspension
//! point, so it runs once per approval no matter how often the step is
//! re-entered.
//!
//! Input: `{"stock": "WIPRO", "price": 239.70, "quantity": 50}`. The outcome
//! is stored under `result`.

use crate::collaborators::{Broker, Collaborators, Order};
use hitl_core::{
    step_keys, DefinitionError, Next, StepContext, StepError, Workflow, WorkflowBuilder,
    WorkflowState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const NAME: &str = "purchase_stock";

step_keys! {
    pub enum PurchaseSteps {
        ValidateOrder => "validate_order",
        ConfirmPurchase => "confirm_purchase",
    }
}

pub fn workflow(collaborators: &Collaborators) -> Result<Workflow<PurchaseSteps>, DefinitionError> {
    let broker = collaborators.broker.clone();

    WorkflowBuilder::new(NAME)
        .description("Buy shares after an explicit yes from the approver")
        .add_step(PurchaseSteps::ValidateOrder, validate_order)
        .add_step(PurchaseSteps::ConfirmPurchase, move |ctx| {
            confirm_purchase(ctx, broker.clone())
        })
        .add_conditional_edge(PurchaseSteps::ValidateOrder, |state: &WorkflowState| {
            if state.contains_key("result") {
                Next::End
            } else {
                Next::Step(PurchaseSteps::ConfirmPurchase)
            }
        })
        .add_edge(PurchaseSteps::ConfirmPurchase, Next::End)
        .set_start(PurchaseSteps::ValidateOrder)
        .build()
}

/// Question shown to the approver
pub fn approval_question(order: &Order) -> String {
    format!(
        "Approve buying {} shares of {} at {} each? (yes/no): ",
        order.quantity, order.stock_name, order.price
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_order(state: &WorkflowState) -> Result<Order, String> {
    let stock_name = state
        .get("stock")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if stock_name.is_empty() {
        return Err("Stock name cannot be empty".to_string());
    }

    let price = state.get("price").and_then(Value::as_f64).unwrap_or(0.0);
    if price <= 0.0 || !price.is_finite() {
        return Err("Stock price must be greater than 0".to_string());
    }

    let quantity = match state.get("quantity") {
        Some(value) => match value.as_i64() {
            Some(q) if q > 0 => q as u64,
            Some(_) => return Err("Quantity must be greater than 0".to_string()),
            None => return Err("Quantity must be a whole number".to_string()),
        },
        None => return Err("Quantity must be greater than 0".to_string()),
    };

    Ok(Order {
        stock_name: stock_name.to_string(),
        price,
        quantity,
    })
}

async fn validate_order(ctx: StepContext) -> Result<Value, StepError> {
    match parse_order(ctx.state()) {
        Ok(_) => Ok(Value::Null),
        Err(message) => {
            warn!(thread_id = %ctx.thread_id(), %message, "Purchase request rejected");
            Ok(json!({
                "result": {
                    "status": "error",
                    "error_type": "validation_error",
                    "message": message,
                }
            }))
        }
    }
}

async fn confirm_purchase(ctx: StepContext, broker: Arc<dyn Broker>) -> Result<Value, StepError> {
    let order = parse_order(ctx.state()).map_err(StepError::Failed)?;
    let question = approval_question(&order);
    let decision = ctx.interrupt_for_decision(json!({
        "question": question,
        "stock": order.stock_name,
        "price": order.price,
        "quantity": order.quantity,
    }))?;

    if !decision.approved {
        return Ok(json!({
            "result": {
                "status": "cancelled",
                "message": format!(
                    "Purchase of {} shares of {} was cancelled by user.",
                    order.quantity, order.stock_name
                ),
                "stock_name": order.stock_name,
                "quantity": order.quantity,
                "price_per_unit": order.price,
            }
        }));
    }

    let order = Order {
        stock_name: order.stock_name.to_uppercase(),
        ..order
    };
    let result = match broker.buy(&order).await {
        Ok(confirmation) => {
            info!(thread_id = %ctx.thread_id(), stock = %order.stock_name, quantity = order.quantity, %confirmation, "Purchase executed");
            json!({
                "status": "success",
                "action": "purchase_stock",
                "stock_name": order.stock_name,
                "price_per_unit": round2(order.price),
                "quantity": order.quantity,
                "total_cost": round2(order.price * order.quantity as f64),
                "confirmation": confirmation,
                "message": format!(
                    "Successfully purchased {} shares of {} at {} each.",
                    order.quantity, order.stock_name, order.price
                ),
            })
        }
        Err(e) => {
            warn!(thread_id = %ctx.thread_id(), error = %e, "Broker refused purchase");
            json!({
                "status": "error",
                "error_type": "internal_error",
                "message": "An unexpected error occurred while purchasing stock.",
                "details": e.to_string(),
            })
        }
    };
    Ok(json!({ "result": result }))
}
