mod relocation_test;
