pub mod check_op;
pub mod relay_poke_op;
