//! Engine test suite: frame codec, connection loop, stream lifecycle.


mod end_to_end;
