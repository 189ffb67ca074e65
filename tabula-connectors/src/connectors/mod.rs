pub mod aircall;
