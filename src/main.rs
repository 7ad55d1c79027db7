fn main() {
    statsheet_lib::run()
}
