mod calculate_bmi;
mod get_today;

use crate::backend::ToolSet;

pub use calculate_bmi::CalculateBmi;
pub use get_today::GetToday;

pub fn builtin_toolset() -> ToolSet {
    ToolSet::new()
        .add_tool::<CalculateBmi>()
        .expect("calculate bmi")
        .add_tool::<GetToday>()
        .expect("get today")
}
