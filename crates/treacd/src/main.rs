mod hal_i2c;
mod runtime;

fn main() {
    runtime::run_from_args();
}
