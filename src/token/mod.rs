//! 代币精度发现、单位换算与余额查询。

pub mod amount;
pub mod balance;
pub mod decimals;

pub use amount::{base_units_to_ui, lamports_to_sol, ui_to_base_units};
pub use balance::BalanceReader;
pub use decimals::{DecimalResolver, MINT_DECIMALS_OFFSET};
