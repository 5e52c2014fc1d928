pub mod board_interface;
