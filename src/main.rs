fn main() {
    kirara_lib::run()
}
