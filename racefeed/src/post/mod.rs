pub mod board_print;
