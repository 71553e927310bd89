//! Integration tests: loops driven end to end through an in-memory broker.

mod trading_loop;
